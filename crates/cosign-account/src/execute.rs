//! Call dispatch for validated transactions
//!
//! The account understands three kinds of targets:
//! - token contracts in the ledger (`transfer`, `approve`, `transferFrom`)
//! - its own spending-limit registry (`setSpendingLimit`, `removeSpendingLimit`)
//! - itself, for `executeBatch`
//!
//! Any other target only accepts plain native value with an empty payload.

use cosign_ledger::{EntryReason, TokenLedger};
use cosign_policy::SpendingLimitRegistry;
use cosign_types::{Address, AssetId, Call, ExecError, Timestamp, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SmartAccount;

/// Mutable world the account executes against
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    pub ledger: &'a mut TokenLedger,
    pub limits: &'a mut SpendingLimitRegistry,
    /// Block timestamp
    pub now: Timestamp,
}

/// Summary of a successful execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Leaf calls dispatched (a batch of n entries counts n)
    pub calls_executed: usize,
}

impl SmartAccount {
    /// Execute a validated transaction.
    ///
    /// Stops at the first failing call. Effects of earlier calls are left in
    /// `ctx`; the caller owns the snapshot and discards them on error.
    pub fn execute(
        &self,
        tx: &Transaction,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ExecError> {
        if tx.sender != self.address() {
            return Err(ExecError::unauthorized(format!(
                "transaction sender {} is not account {}",
                tx.sender,
                self.address()
            )));
        }

        let mut report = ExecutionReport::default();
        self.dispatch(ctx, &tx.to, tx.value, &tx.data, true, &mut report)?;
        Ok(report)
    }

    fn limits_enabled(&self, limits: &SpendingLimitRegistry) -> bool {
        self.registry() == Some(limits.address())
    }

    fn consume_limit(
        &self,
        ctx: &mut ExecutionContext<'_>,
        asset: AssetId,
        amount: u128,
    ) -> Result<(), ExecError> {
        if self.limits_enabled(ctx.limits) {
            ctx.limits
                .check_and_consume(self.address(), asset, amount, ctx.now)?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        ctx: &mut ExecutionContext<'_>,
        target: &Address,
        value: u128,
        data: &[u8],
        top_level: bool,
        report: &mut ExecutionReport,
    ) -> Result<(), ExecError> {
        let me = self.address();

        if value > 0 {
            self.consume_limit(ctx, Address::NATIVE_ASSET, value)?;
            ctx.ledger
                .transfer(&Address::NATIVE_ASSET, &me, target, value)
                .map_err(|e| ExecError::call_failed(*target, e))?;
        }

        let call = Call::decode(data).map_err(|e| ExecError::call_failed(*target, e))?;
        debug!(account = %me, %target, value, call = ?call, "dispatch");

        // Any call moving the account's own tokens counts against the limit
        if let Some(amount) = call.as_ref().and_then(|c| c.outflow_from(&me)) {
            self.consume_limit(ctx, *target, amount)?;
        }

        match call {
            None if data.is_empty() => {}
            None => return Err(ExecError::call_failed(*target, "unrecognised call")),

            Some(Call::ExecuteBatch(entries)) => {
                if *target != me {
                    return Err(ExecError::call_failed(*target, "batch must target the account itself"));
                }
                if !top_level {
                    return Err(ExecError::call_failed(*target, "nested batch"));
                }
                for entry in &entries {
                    self.dispatch(ctx, &entry.target, 0, &entry.payload, false, report)?;
                }
                return Ok(());
            }

            Some(Call::SetSpendingLimit {
                account,
                asset,
                amount,
            }) => {
                self.authorize_registry_call(ctx, target, &account)?;
                ctx.limits.set_limit(account, asset, amount, ctx.now);
            }
            Some(Call::RemoveSpendingLimit { account, asset }) => {
                self.authorize_registry_call(ctx, target, &account)?;
                ctx.limits.remove_limit(account, asset);
            }

            Some(Call::Transfer { to, amount }) => {
                ctx.ledger
                    .transfer(target, &me, &to, amount)
                    .map_err(|e| ExecError::call_failed(*target, e))?;
            }
            Some(Call::Approve { spender, amount }) => {
                ctx.ledger
                    .approve(target, &me, &spender, amount)
                    .map_err(|e| ExecError::call_failed(*target, e))?;
            }
            Some(Call::TransferFrom { from, to, amount }) => {
                ctx.ledger
                    .transfer_from(target, &me, &from, &to, amount, EntryReason::Transfer)
                    .map_err(|e| ExecError::call_failed(*target, e))?;
            }
        }

        report.calls_executed += 1;
        Ok(())
    }

    /// Registry calls must go to this account's own registry and name this
    /// account as the subject.
    fn authorize_registry_call(
        &self,
        ctx: &ExecutionContext<'_>,
        target: &Address,
        subject: &Address,
    ) -> Result<(), ExecError> {
        if !self.limits_enabled(ctx.limits) || self.registry() != Some(*target) {
            return Err(ExecError::unauthorized(format!(
                "{} is not the spending-limit registry of {}",
                target,
                self.address()
            )));
        }
        if *subject != self.address() {
            return Err(ExecError::unauthorized(format!(
                "account {} cannot manage limits of {}",
                self.address(),
                subject
            )));
        }
        Ok(())
    }
}

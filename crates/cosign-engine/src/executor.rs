//! Transaction executor
//!
//! Applies one transaction at a time as a single state transition:
//!
//! 1. validate (both owner signatures, nonce; the nonce bump is kept even if
//!    a later phase fails)
//! 2. charge the fee (sponsor or self-paid)
//! 3. execute the calls
//! 4. settle the unused fee
//!
//! A failure in phases 2-4 restores the world to its state right after
//! validation.

use std::sync::Arc;

use cosign_account::{AccountFactory, AccountParams, ExecutionContext};
use cosign_ledger::EntryReason;
use cosign_sponsor::{ChargeReceipt, OracleRegistry, PriceOracle, Settlement};
use cosign_types::{Address, Timestamp, Transaction, TxHash};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::world::WorldState;

/// Per-block inputs supplied by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockContext {
    /// Block time; the only clock the engine reads
    pub timestamp: Timestamp,
    /// Fee units the transaction actually consumed
    pub units_used: u128,
}

impl BlockContext {
    pub fn new(timestamp: Timestamp, units_used: u128) -> Self {
        Self {
            timestamp,
            units_used,
        }
    }
}

/// Result of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub tx_hash: TxHash,
    pub sender: Address,
    pub nonce: u64,
    /// Native fee kept by the fee sink
    pub fee_charged: u128,
    /// Native fee returned to whoever advanced it
    pub fee_refunded: u128,
    pub calls_executed: usize,
    pub sponsor_receipt: Option<ChargeReceipt>,
    pub settlement: Option<Settlement>,
}

/// Single-threaded transaction engine
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    factory: AccountFactory,
    world: WorldState,
    /// Read-only during a transaction, so outside the snapshot
    oracles: OracleRegistry,
}

impl Engine {
    /// Create an engine with an empty world
    pub fn new(config: EngineConfig, factory: Address, registry: Address) -> Self {
        let world = WorldState::new(registry, config.limit_window_secs);
        Self {
            config,
            factory: AccountFactory::new(factory),
            world,
            oracles: OracleRegistry::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn factory(&self) -> &AccountFactory {
        &self.factory
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Direct state access for setup (funding, sponsors, limits)
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn register_oracle(&mut self, address: Address, oracle: Arc<dyn PriceOracle>) {
        self.oracles.register(address, oracle);
    }

    /// Deploy an account through the engine's factory
    pub fn deploy_account(&mut self, salt: &[u8; 32], params: &AccountParams) -> Result<Address> {
        self.world.deploy_account(&self.factory, salt, params)
    }

    /// Decode a wire-encoded transaction and apply it
    pub fn apply_encoded(&mut self, bytes: &[u8], block: &BlockContext) -> Result<TxOutcome> {
        let tx = Transaction::decode(bytes)?;
        self.apply(&tx, block)
    }

    /// Apply `tx` atomically
    pub fn apply(&mut self, tx: &Transaction, block: &BlockContext) -> Result<TxOutcome> {
        let account = self
            .world
            .accounts
            .get_mut(&tx.sender)
            .ok_or(EngineError::UnknownAccount(tx.sender))?;

        let tx_hash = match account.validate(tx, self.config.chain_id) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(
                    account = %tx.sender,
                    nonce = tx.nonce,
                    code = e.error_code(),
                    error = %e,
                    "transaction rejected"
                );
                return Err(e.into());
            }
        };

        // Taken after validation so a revert keeps the nonce bump
        let snapshot = self.world.clone();

        match run_phases(&mut self.world, &self.oracles, &self.config, tx, tx_hash, block) {
            Ok(outcome) => {
                info!(
                    account = %tx.sender,
                    nonce = tx.nonce,
                    tx_hash = %tx_hash,
                    calls = outcome.calls_executed,
                    fee_charged = outcome.fee_charged,
                    sponsored = tx.is_sponsored(),
                    "transaction committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.world = snapshot;
                warn!(
                    account = %tx.sender,
                    nonce = tx.nonce,
                    tx_hash = %tx_hash,
                    code = e.error_code(),
                    error = %e,
                    "transaction reverted, nonce consumed"
                );
                Err(e)
            }
        }
    }
}

fn run_phases(
    world: &mut WorldState,
    oracles: &OracleRegistry,
    config: &EngineConfig,
    tx: &Transaction,
    tx_hash: TxHash,
    block: &BlockContext,
) -> Result<TxOutcome> {
    let fee = tx.max_fee().ok_or(EngineError::FeeOverflow {
        fee_limit: tx.fee_limit,
        fee_per_unit: tx.fee_per_unit,
    })?;
    world.ledger.set_correlation(Some(tx_hash));

    let receipt = match &tx.sponsor {
        Some(params) => {
            let sponsor = world
                .sponsors
                .get(&params.sponsor)
                .ok_or(EngineError::UnknownSponsor(params.sponsor))?;
            let receipt = sponsor.prevalidate_and_charge(
                tx,
                fee,
                &mut world.ledger,
                oracles,
                block.timestamp,
                config.oracle_max_age_secs,
            )?;
            Some(receipt)
        }
        None => {
            world
                .ledger
                .transfer_with_reason(
                    &Address::NATIVE_ASSET,
                    &tx.sender,
                    &Address::BOOTLOADER,
                    fee,
                    EntryReason::FeeCharge,
                )
                .map_err(|e| EngineError::FeePaymentFailed {
                    account: tx.sender,
                    reason: e.to_string(),
                })?;
            None
        }
    };

    let account = world
        .accounts
        .get(&tx.sender)
        .ok_or(EngineError::UnknownAccount(tx.sender))?;
    let mut ctx = ExecutionContext {
        ledger: &mut world.ledger,
        limits: &mut world.limits,
        now: block.timestamp,
    };
    let report = account.execute(tx, &mut ctx)?;

    // Bounded by `fee`, which already fit in a u128
    let actual_fee = block.units_used.min(tx.fee_limit).saturating_mul(tx.fee_per_unit).min(fee);
    let fee_refunded = fee - actual_fee;

    let settlement = match &receipt {
        Some(receipt) => {
            let sponsor = world
                .sponsors
                .get(&receipt.sponsor)
                .ok_or(EngineError::UnknownSponsor(receipt.sponsor))?;
            Some(sponsor.post_operation(receipt, actual_fee, &mut world.ledger)?)
        }
        None => {
            world
                .ledger
                .transfer_with_reason(
                    &Address::NATIVE_ASSET,
                    &Address::BOOTLOADER,
                    &tx.sender,
                    fee_refunded,
                    EntryReason::FeeRefund,
                )
                .map_err(|e| EngineError::FeePaymentFailed {
                    account: tx.sender,
                    reason: e.to_string(),
                })?;
            None
        }
    };
    world.ledger.set_correlation(None);

    Ok(TxOutcome {
        tx_hash,
        sender: tx.sender,
        nonce: tx.nonce,
        fee_charged: actual_fee,
        fee_refunded,
        calls_executed: report.calls_executed,
        sponsor_receipt: receipt,
        settlement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_types::AuthError;

    #[test]
    fn test_unknown_account() {
        let mut engine = Engine::new(EngineConfig::default(), Address([0xfa; 20]), Address([0x0e; 20]));
        let tx = Transaction::new(Address([0x11; 20]), Address([0x22; 20]), 0);
        assert_eq!(
            engine.apply(&tx, &BlockContext::default()),
            Err(EngineError::UnknownAccount(Address([0x11; 20])))
        );
    }

    #[test]
    fn test_unsigned_transaction_keeps_nonce() {
        let mut engine = Engine::new(EngineConfig::default(), Address([0xfa; 20]), Address([0x0e; 20]));
        let params = AccountParams::new(Address([1; 20]), Address([2; 20]));
        let account = engine.deploy_account(&[0u8; 32], &params).unwrap();

        let tx = Transaction::new(account, Address([0x22; 20]), 0);
        assert!(matches!(
            engine.apply(&tx, &BlockContext::default()),
            Err(EngineError::Auth(AuthError::MalformedSignature { .. }))
        ));
        assert_eq!(engine.world().nonce(&account), Some(0));
    }

    #[test]
    fn test_garbage_bytes_are_decode_errors() {
        let mut engine = Engine::new(EngineConfig::default(), Address([0xfa; 20]), Address([0x0e; 20]));
        let err = engine.apply_encoded(&[0u8; 7], &BlockContext::default()).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }
}

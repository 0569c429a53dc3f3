//! The fee sponsor (paymaster)

use std::collections::HashMap;

use cosign_ledger::{EntryReason, TokenLedger};
use cosign_types::{
    Address, AssetId, SponsorError, SponsorMode, Timestamp, Transaction, WordReader, WORD,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::oracle::{tokens_for_fee, OracleRegistry};

/// A token the sponsor accepts as fee payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorTokenConfig {
    pub asset: AssetId,
    /// Smallest allowance a transaction may declare for this token
    pub min_fee: u128,
    /// Whether the token is currently accepted
    pub sponsored: bool,
    /// Address of the oracle pricing this token
    pub oracle: Address,
}

impl SponsorTokenConfig {
    pub fn new(asset: AssetId, min_fee: u128, oracle: Address) -> Self {
        Self {
            asset,
            min_fee,
            sponsored: true,
            oracle,
        }
    }
}

/// Token side of a charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCharge {
    pub asset: AssetId,
    /// Tokens pulled from the account
    pub amount: u128,
    /// Oracle rate used for pricing
    pub rate: u128,
    pub decimals: u8,
}

/// What `prevalidate_and_charge` collected and advanced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    pub sponsor: Address,
    pub account: Address,
    /// Native fee advanced to the fee sink
    pub fee_advanced: u128,
    /// Present in approval-based mode
    pub token_charge: Option<TokenCharge>,
}

/// What `post_operation` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settlement {
    /// Native currency returned from the fee sink to the sponsor
    pub native_returned: u128,
    /// Tokens returned from the sponsor to the account
    pub tokens_refunded: u128,
}

/// A fee sponsor
#[derive(Debug, Clone)]
pub struct FeeSponsor {
    address: Address,
    admin: Address,
    tokens: HashMap<AssetId, SponsorTokenConfig>,
}

impl FeeSponsor {
    /// Create a sponsor at `address` administered by `admin`
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            admin,
            tokens: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    fn ensure_admin(&self, caller: &Address) -> Result<(), SponsorError> {
        if *caller != self.admin {
            return Err(SponsorError::NotAdministrator { caller: *caller });
        }
        Ok(())
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Accept a token (replaces an existing config for the same asset)
    pub fn add_token(&mut self, caller: &Address, config: SponsorTokenConfig) -> Result<(), SponsorError> {
        self.ensure_admin(caller)?;
        info!(
            sponsor = %self.address,
            asset = %config.asset,
            min_fee = config.min_fee,
            oracle = %config.oracle,
            "sponsor token configured"
        );
        self.tokens.insert(config.asset, config);
        Ok(())
    }

    /// Stop accepting a token
    pub fn remove_token(&mut self, caller: &Address, asset: &AssetId) -> Result<(), SponsorError> {
        self.ensure_admin(caller)?;
        if self.tokens.remove(asset).is_some() {
            info!(sponsor = %self.address, %asset, "sponsor token removed");
        }
        Ok(())
    }

    /// Pause or resume a configured token
    pub fn set_sponsored(
        &mut self,
        caller: &Address,
        asset: &AssetId,
        sponsored: bool,
    ) -> Result<(), SponsorError> {
        self.ensure_admin(caller)?;
        let config = self
            .tokens
            .get_mut(asset)
            .ok_or_else(|| SponsorError::UnsupportedAsset {
                asset: *asset,
                reason: "not configured".to_string(),
            })?;
        config.sponsored = sponsored;
        info!(sponsor = %self.address, %asset, sponsored, "sponsor token toggled");
        Ok(())
    }

    pub fn token(&self, asset: &AssetId) -> Option<&SponsorTokenConfig> {
        self.tokens.get(asset)
    }

    // ========================================================================
    // Charging
    // ========================================================================

    /// Decide whether to cover `fee` for `tx` and collect payment.
    ///
    /// On success the native fee has been moved from the sponsor to the fee
    /// sink and, in approval-based mode, the token payment has been pulled
    /// from the account. On failure the caller discards all ledger changes.
    pub fn prevalidate_and_charge(
        &self,
        tx: &Transaction,
        fee: u128,
        ledger: &mut TokenLedger,
        oracles: &OracleRegistry,
        now: Timestamp,
        max_quote_age: u64,
    ) -> Result<ChargeReceipt, SponsorError> {
        let params = tx
            .sponsor
            .as_ref()
            .filter(|params| params.sponsor == self.address)
            .ok_or_else(|| SponsorError::charge_failed("transaction is not addressed to this sponsor"))?;

        let token_charge = match &params.mode {
            SponsorMode::General => None,
            SponsorMode::ApprovalBased {
                asset,
                min_allowance,
                extra,
            } => Some(self.collect_tokens(
                tx,
                fee,
                asset,
                *min_allowance,
                extra,
                ledger,
                oracles,
                now,
                max_quote_age,
            )?),
        };

        ledger
            .transfer_with_reason(
                &Address::NATIVE_ASSET,
                &self.address,
                &Address::BOOTLOADER,
                fee,
                EntryReason::FeeCharge,
            )
            .map_err(SponsorError::charge_failed)?;

        info!(
            sponsor = %self.address,
            account = %tx.sender,
            fee,
            tokens = token_charge.as_ref().map(|c| c.amount).unwrap_or(0),
            "sponsor charged"
        );

        Ok(ChargeReceipt {
            sponsor: self.address,
            account: tx.sender,
            fee_advanced: fee,
            token_charge,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_tokens(
        &self,
        tx: &Transaction,
        fee: u128,
        asset: &AssetId,
        min_allowance: u128,
        extra: &[u8],
        ledger: &mut TokenLedger,
        oracles: &OracleRegistry,
        now: Timestamp,
        max_quote_age: u64,
    ) -> Result<TokenCharge, SponsorError> {
        let unsupported = |reason: &str| SponsorError::UnsupportedAsset {
            asset: *asset,
            reason: reason.to_string(),
        };

        let config = self
            .tokens
            .get(asset)
            .ok_or_else(|| unsupported("not configured"))?;
        if !config.sponsored {
            return Err(unsupported("not sponsored"));
        }
        if min_allowance < config.min_fee {
            return Err(SponsorError::InsufficientAllowance {
                asset: *asset,
                required: config.min_fee,
                actual: min_allowance,
            });
        }

        let allowance = ledger.allowance(asset, &tx.sender, &self.address);
        if allowance < min_allowance {
            return Err(SponsorError::InsufficientAllowance {
                asset: *asset,
                required: min_allowance,
                actual: allowance,
            });
        }

        let oracle = oracles
            .get(&config.oracle)
            .ok_or_else(|| unsupported("no oracle"))?;
        let quote = oracle.quote(asset).ok_or_else(|| unsupported("no price feed"))?;
        if quote.rate == 0 {
            return Err(unsupported("zero rate"));
        }
        let age = now.saturating_sub(quote.updated_at);
        if age > max_quote_age {
            return Err(SponsorError::charge_failed(format!(
                "stale rate: {}s old, max {}s",
                age, max_quote_age
            )));
        }
        if let Some(quoted) = quoted_rate(extra) {
            if quote.rate < quoted {
                return Err(SponsorError::charge_failed(format!(
                    "rate moved against account: quoted {}, oracle {}",
                    quoted, quote.rate
                )));
            }
        }

        let decimals = oracle.decimals();
        let amount = tokens_for_fee(fee, quote.rate, decimals)
            .ok_or_else(|| SponsorError::charge_failed("token amount overflow"))?;

        ledger
            .transfer_from(
                asset,
                &self.address,
                &tx.sender,
                &self.address,
                amount,
                EntryReason::FeeCharge,
            )
            .map_err(SponsorError::charge_failed)?;

        debug!(%asset, amount, rate = quote.rate, decimals, "tokens collected");
        Ok(TokenCharge {
            asset: *asset,
            amount,
            rate: quote.rate,
            decimals,
        })
    }

    /// Reconcile the charged fee against what the transaction actually cost.
    ///
    /// Unused native fee returns to the sponsor; tokens collected above the
    /// price of `actual_fee` return to the account. A shortfall is absorbed
    /// by the sponsor.
    pub fn post_operation(
        &self,
        receipt: &ChargeReceipt,
        actual_fee: u128,
        ledger: &mut TokenLedger,
    ) -> Result<Settlement, SponsorError> {
        let actual_fee = actual_fee.min(receipt.fee_advanced);
        let native_returned = receipt.fee_advanced - actual_fee;
        ledger
            .transfer_with_reason(
                &Address::NATIVE_ASSET,
                &Address::BOOTLOADER,
                &receipt.sponsor,
                native_returned,
                EntryReason::FeeRefund,
            )
            .map_err(SponsorError::charge_failed)?;

        let mut tokens_refunded = 0;
        if let Some(charge) = &receipt.token_charge {
            let owed = tokens_for_fee(actual_fee, charge.rate, charge.decimals)
                .unwrap_or(charge.amount);
            tokens_refunded = charge.amount.saturating_sub(owed);
            ledger
                .transfer_with_reason(
                    &charge.asset,
                    &receipt.sponsor,
                    &receipt.account,
                    tokens_refunded,
                    EntryReason::FeeRefund,
                )
                .map_err(SponsorError::charge_failed)?;
        }

        if native_returned > 0 || tokens_refunded > 0 {
            info!(
                sponsor = %receipt.sponsor,
                account = %receipt.account,
                native_returned,
                tokens_refunded,
                "sponsor settled"
            );
        }
        Ok(Settlement {
            native_returned,
            tokens_refunded,
        })
    }
}

/// A single-word `extra` carries the rate the client saw when signing
fn quoted_rate(extra: &[u8]) -> Option<u128> {
    if extra.len() != WORD {
        return None;
    }
    WordReader::new(extra).uint().ok()
}

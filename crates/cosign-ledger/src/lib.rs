//! Cosign Ledger - Token ledger collaborator for smart accounts
//!
//! The ledger is:
//! - Asset-scoped (the native currency is pre-registered at `Address::NATIVE_ASSET`)
//! - Keyed by account address
//! - Double-entry (every debit has a matching credit)
//! - Append-only (journal entries are never rewritten)
//! - Transaction-linked (entries carry the hash of the transaction that caused them)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. A failed operation leaves balances, allowances and journal untouched
//!
//! The ledger is a plain value: cloning it yields an independent snapshot,
//! which is how the executor rolls back a failed transaction.

use std::collections::HashMap;

use cosign_types::{Address, AssetId, TxHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown asset: {asset}")]
    UnknownAsset { asset: AssetId },

    #[error("Asset already registered: {asset}")]
    AssetAlreadyRegistered { asset: AssetId },

    #[error("Insufficient balance of {asset} for {account}: have {available}, need {required}")]
    InsufficientBalance {
        asset: AssetId,
        account: Address,
        available: u128,
        required: u128,
    },

    #[error("Insufficient allowance of {asset} from {owner} to {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        asset: AssetId,
        owner: Address,
        spender: Address,
        available: u128,
        required: u128,
    },

    #[error("Balance overflow of {asset} for {account}")]
    BalanceOverflow { asset: AssetId, account: Address },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Registered asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub asset: AssetId,
    pub symbol: String,
    pub decimals: u8,
}

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to an account
    Credit,
    /// Debit (decrease) from an account
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// Transfer between accounts
    Transfer,
    /// Supply created for an account
    Mint,
    /// Fee moved to the fee sink or collected by a sponsor
    FeeCharge,
    /// Unused fee returned
    FeeRefund,
}

/// A single ledger entry (one side of a double-entry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the journal
    pub sequence: u64,
    pub account: Address,
    pub asset: AssetId,
    pub entry_type: EntryType,
    pub amount: u128,
    pub balance_after: u128,
    pub reason: EntryReason,
    /// Transaction that caused this entry, if any
    pub correlation: Option<TxHash>,
}

/// The token ledger
#[derive(Debug, Clone)]
pub struct TokenLedger {
    assets: HashMap<AssetId, AssetInfo>,
    balances: HashMap<(AssetId, Address), u128>,
    /// (asset, owner, spender) -> allowance
    allowances: HashMap<(AssetId, Address, Address), u128>,
    /// All entries (append-only)
    entries: Vec<LedgerEntry>,
    correlation: Option<TxHash>,
}

impl TokenLedger {
    /// Create a ledger with only the native asset registered
    pub fn new() -> Self {
        let mut assets = HashMap::new();
        assets.insert(
            Address::NATIVE_ASSET,
            AssetInfo {
                asset: Address::NATIVE_ASSET,
                symbol: "ETH".to_string(),
                decimals: 18,
            },
        );
        Self {
            assets,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            entries: Vec::new(),
            correlation: None,
        }
    }

    /// Register a fungible token
    pub fn register_asset(
        &mut self,
        asset: AssetId,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Result<()> {
        if self.assets.contains_key(&asset) {
            return Err(LedgerError::AssetAlreadyRegistered { asset });
        }
        let symbol = symbol.into();
        debug!(%asset, %symbol, decimals, "registered asset");
        self.assets.insert(
            asset,
            AssetInfo {
                asset,
                symbol,
                decimals,
            },
        );
        Ok(())
    }

    /// Get asset metadata
    pub fn asset(&self, asset: &AssetId) -> Result<&AssetInfo> {
        self.assets
            .get(asset)
            .ok_or(LedgerError::UnknownAsset { asset: *asset })
    }

    /// Check if an asset is registered
    pub fn is_registered(&self, asset: &AssetId) -> bool {
        self.assets.contains_key(asset)
    }

    /// Tag subsequent entries with a transaction hash (`None` to clear)
    pub fn set_correlation(&mut self, correlation: Option<TxHash>) {
        self.correlation = correlation;
    }

    /// Balance of `owner` in `asset` (zero if never credited)
    pub fn balance_of(&self, asset: &AssetId, owner: &Address) -> u128 {
        self.balances.get(&(*asset, *owner)).copied().unwrap_or(0)
    }

    /// Allowance `owner` has granted `spender` on `asset`
    pub fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Set the allowance `owner` grants `spender` (overwrites)
    pub fn approve(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<()> {
        self.asset(asset)?;
        debug!(%asset, %owner, %spender, amount, "approve");
        if amount == 0 {
            self.allowances.remove(&(*asset, *owner, *spender));
        } else {
            self.allowances.insert((*asset, *owner, *spender), amount);
        }
        Ok(())
    }

    /// Move `amount` of `asset` from `from` to `to`
    pub fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        self.move_funds(asset, from, to, amount, EntryReason::Transfer)
    }

    /// Move funds with an explicit journal reason (fee charges and refunds)
    pub fn transfer_with_reason(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
        reason: EntryReason,
    ) -> Result<()> {
        self.move_funds(asset, from, to, amount, reason)
    }

    /// `spender` moves `amount` from `owner` to `to`, consuming allowance
    pub fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u128,
        reason: EntryReason,
    ) -> Result<()> {
        self.asset(asset)?;
        let available = self.allowance(asset, owner, spender);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientAllowance {
                asset: *asset,
                owner: *owner,
                spender: *spender,
                available,
                required: amount,
            })?;

        self.move_funds(asset, owner, to, amount, reason)?;

        // Allowance is only consumed once the move succeeded
        if remaining == 0 {
            self.allowances.remove(&(*asset, *owner, *spender));
        } else {
            self.allowances.insert((*asset, *owner, *spender), remaining);
        }
        Ok(())
    }

    /// Create `amount` of `asset` for `to`
    pub fn mint(&mut self, asset: &AssetId, to: &Address, amount: u128) -> Result<u128> {
        self.asset(asset)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }
        let balance = self.balance_of(asset, to);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                asset: *asset,
                account: *to,
            })?;
        self.balances.insert((*asset, *to), new_balance);
        self.record(*to, *asset, EntryType::Credit, amount, new_balance, EntryReason::Mint);
        debug!(%asset, %to, amount, "mint");
        Ok(new_balance)
    }

    fn move_funds(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
        reason: EntryReason,
    ) -> Result<()> {
        self.asset(asset)?;
        if amount == 0 {
            return Ok(());
        }

        let from_balance = self.balance_of(asset, from);
        let from_after = from_balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                asset: *asset,
                account: *from,
                available: from_balance,
                required: amount,
            })?;
        if from == to {
            return Ok(());
        }

        let to_after = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                asset: *asset,
                account: *to,
            })?;

        self.balances.insert((*asset, *from), from_after);
        self.balances.insert((*asset, *to), to_after);
        self.record(*from, *asset, EntryType::Debit, amount, from_after, reason);
        self.record(*to, *asset, EntryType::Credit, amount, to_after, reason);
        Ok(())
    }

    fn record(
        &mut self,
        account: Address,
        asset: AssetId,
        entry_type: EntryType,
        amount: u128,
        balance_after: u128,
        reason: EntryReason,
    ) {
        self.entries.push(LedgerEntry {
            sequence: self.entries.len() as u64,
            account,
            asset,
            entry_type,
            amount,
            balance_after,
            reason,
            correlation: self.correlation,
        });
    }

    /// Get all entries for an account
    pub fn account_entries(&self, account: &Address) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Get entries caused by a transaction
    pub fn correlated_entries(&self, tx_hash: &TxHash) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.correlation.as_ref() == Some(tx_hash))
            .cloned()
            .collect()
    }

    /// Get the total number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get recent entries (newest first)
    pub fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address([0x70; 20]);
    const ALICE: Address = Address([0xa1; 20]);
    const BOB: Address = Address([0xb0; 20]);
    const SPONSOR: Address = Address([0x5a; 20]);

    fn ledger() -> TokenLedger {
        let mut ledger = TokenLedger::new();
        ledger.register_asset(TOKEN, "USDC", 6).unwrap();
        ledger.mint(&TOKEN, &ALICE, 1_000).unwrap();
        ledger
    }

    #[test]
    fn test_native_asset_preregistered() {
        let ledger = TokenLedger::new();
        assert!(ledger.is_registered(&Address::NATIVE_ASSET));
        assert_eq!(ledger.asset(&Address::NATIVE_ASSET).unwrap().decimals, 18);
    }

    #[test]
    fn test_transfer() {
        let mut ledger = ledger();
        ledger.transfer(&TOKEN, &ALICE, &BOB, 400).unwrap();
        assert_eq!(ledger.balance_of(&TOKEN, &ALICE), 600);
        assert_eq!(ledger.balance_of(&TOKEN, &BOB), 400);
        // mint + debit + credit
        assert_eq!(ledger.entry_count(), 3);
    }

    #[test]
    fn test_insufficient_balance() {
        let mut ledger = ledger();
        let result = ledger.transfer(&TOKEN, &ALICE, &BOB, 1_001);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance {
                available: 1_000,
                required: 1_001,
                ..
            })
        ));
        assert_eq!(ledger.balance_of(&TOKEN, &ALICE), 1_000);
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn test_unknown_asset() {
        let mut ledger = ledger();
        let other = Address([0x71; 20]);
        assert!(matches!(
            ledger.transfer(&other, &ALICE, &BOB, 1),
            Err(LedgerError::UnknownAsset { .. })
        ));
        assert!(ledger.register_asset(TOKEN, "USDC", 6).is_err());
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut ledger = ledger();
        ledger.approve(&TOKEN, &ALICE, &SPONSOR, 300).unwrap();
        assert_eq!(ledger.allowance(&TOKEN, &ALICE, &SPONSOR), 300);

        ledger
            .transfer_from(&TOKEN, &SPONSOR, &ALICE, &SPONSOR, 120, EntryReason::FeeCharge)
            .unwrap();
        assert_eq!(ledger.allowance(&TOKEN, &ALICE, &SPONSOR), 180);
        assert_eq!(ledger.balance_of(&TOKEN, &SPONSOR), 120);

        let err = ledger
            .transfer_from(&TOKEN, &SPONSOR, &ALICE, &SPONSOR, 181, EntryReason::FeeCharge)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { available: 180, .. }));
    }

    #[test]
    fn test_transfer_from_keeps_allowance_on_balance_failure() {
        let mut ledger = ledger();
        ledger.approve(&TOKEN, &ALICE, &SPONSOR, 5_000).unwrap();
        assert!(ledger
            .transfer_from(&TOKEN, &SPONSOR, &ALICE, &SPONSOR, 2_000, EntryReason::FeeCharge)
            .is_err());
        assert_eq!(ledger.allowance(&TOKEN, &ALICE, &SPONSOR), 5_000);
    }

    #[test]
    fn test_zero_transfer_is_noop() {
        let mut ledger = ledger();
        ledger.transfer(&TOKEN, &BOB, &ALICE, 0).unwrap();
        assert_eq!(ledger.entry_count(), 1);
        assert!(ledger.mint(&TOKEN, &BOB, 0).is_err());
    }

    #[test]
    fn test_correlation_tags_entries() {
        let mut ledger = ledger();
        let hash = TxHash([0xee; 32]);
        ledger.set_correlation(Some(hash));
        ledger
            .transfer_with_reason(&TOKEN, &ALICE, &BOB, 10, EntryReason::FeeCharge)
            .unwrap();
        ledger.set_correlation(None);
        ledger.transfer(&TOKEN, &ALICE, &BOB, 10).unwrap();

        let tagged = ledger.correlated_entries(&hash);
        assert_eq!(tagged.len(), 2);
        assert!(tagged.iter().all(|e| e.reason == EntryReason::FeeCharge));
        assert_eq!(ledger.account_entries(&BOB).len(), 2);
        assert_eq!(ledger.recent_entries(1)[0].sequence, 4);
    }

    #[test]
    fn test_clone_is_independent_snapshot() {
        let mut ledger = ledger();
        let snapshot = ledger.clone();
        ledger.transfer(&TOKEN, &ALICE, &BOB, 1).unwrap();
        assert_eq!(snapshot.balance_of(&TOKEN, &ALICE), 1_000);
        assert_eq!(snapshot.entry_count(), 1);
    }

    #[test]
    fn test_entry_serializes() {
        let ledger = ledger();
        let json = serde_json::to_value(&ledger.recent_entries(1)[0]).unwrap();
        assert_eq!(json["reason"], "Mint");
        assert_eq!(json["entry_type"], "Credit");
    }
}

//! Cosign Policy - Spending controls for smart accounts
//!
//! The registry keeps one rolling limit per (account, asset). A limit caps the
//! amount an account may move within a repeating window, independently of
//! whether the owners signed the transaction.
//!
//! ```text
//! Unset ──set──► Active ──consume──► Active(spent↑)
//!   ▲              │ ▲
//!   └───remove─────┘ └──window elapsed / set──► Active(fresh window)
//! ```
//!
//! Time is always passed in; the registry never reads a clock.

use std::collections::HashMap;

use cosign_types::{Address, AssetId, LimitError, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default window length: one day
pub const DEFAULT_WINDOW_SECS: u64 = 86_400;

/// A rolling spending limit
///
/// When `active` is false every other numeric field is zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpendingLimit {
    pub asset: AssetId,
    pub limit: u128,
    pub spent: u128,
    /// Last second of the current window
    pub window_end: Timestamp,
    pub active: bool,
}

impl SpendingLimit {
    fn inactive(asset: AssetId) -> Self {
        Self {
            asset,
            ..Self::default()
        }
    }

    /// Headroom left in the window as of `now`
    pub fn remaining_at(&self, now: Timestamp) -> u128 {
        if now > self.window_end {
            self.limit
        } else {
            self.limit.saturating_sub(self.spent)
        }
    }
}

/// Per-(account, asset) rolling limit ledger
#[derive(Debug, Clone)]
pub struct SpendingLimitRegistry {
    address: Address,
    default_period: u64,
    /// Per-account window overrides
    periods: HashMap<Address, u64>,
    limits: HashMap<(Address, AssetId), SpendingLimit>,
}

impl SpendingLimitRegistry {
    /// Create a registry deployed at `address` with a default window length
    pub fn new(address: Address, default_period: u64) -> Self {
        Self {
            address,
            default_period,
            periods: HashMap::new(),
            limits: HashMap::new(),
        }
    }

    /// Address accounts call to manage their limits
    pub fn address(&self) -> Address {
        self.address
    }

    /// Window length applied to `account`
    pub fn period(&self, account: &Address) -> u64 {
        self.periods
            .get(account)
            .copied()
            .unwrap_or(self.default_period)
    }

    /// Override the window length for one account
    pub fn set_window_period(&mut self, account: Address, period: u64) {
        debug!(%account, period, "window period override");
        self.periods.insert(account, period);
    }

    /// Current entry (the all-zero inactive entry if none was set)
    pub fn limit(&self, account: &Address, asset: &AssetId) -> SpendingLimit {
        self.limits
            .get(&(*account, *asset))
            .cloned()
            .unwrap_or_else(|| SpendingLimit::inactive(*asset))
    }

    /// Headroom as of `now`; `None` when the asset is unrestricted
    pub fn remaining(&self, account: &Address, asset: &AssetId, now: Timestamp) -> Option<u128> {
        self.limits
            .get(&(*account, *asset))
            .filter(|entry| entry.active)
            .map(|entry| entry.remaining_at(now))
    }

    /// Set (or overwrite) a limit, resetting spent and restarting the window
    pub fn set_limit(
        &mut self,
        account: Address,
        asset: AssetId,
        limit: u128,
        now: Timestamp,
    ) -> SpendingLimit {
        let entry = SpendingLimit {
            asset,
            limit,
            spent: 0,
            window_end: now.saturating_add(self.period(&account)),
            active: true,
        };
        info!(%account, %asset, limit, window_end = entry.window_end, "spending limit set");
        self.limits.insert((account, asset), entry.clone());
        entry
    }

    /// Lift the limit immediately
    pub fn remove_limit(&mut self, account: Address, asset: AssetId) {
        if self.limits.remove(&(account, asset)).is_some() {
            info!(%account, %asset, "spending limit removed");
        }
    }

    /// Check `amount` against the limit and record it on success.
    ///
    /// An elapsed window is renewed first. A rejected amount leaves the entry
    /// untouched; there is no partial consumption.
    pub fn check_and_consume(
        &mut self,
        account: Address,
        asset: AssetId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), LimitError> {
        let period = self.period(&account);
        let Some(entry) = self.limits.get_mut(&(account, asset)) else {
            return Ok(());
        };
        if !entry.active {
            return Ok(());
        }

        let (spent, window_end) = if now > entry.window_end {
            debug!(%account, %asset, old_window_end = entry.window_end, "spending window renewed");
            (0, now.saturating_add(period))
        } else {
            (entry.spent, entry.window_end)
        };

        let remaining = entry.limit.saturating_sub(spent);
        let total = spent
            .checked_add(amount)
            .filter(|total| *total <= entry.limit)
            .ok_or(LimitError::LimitExceeded {
                account,
                asset,
                requested: amount,
                remaining,
            })?;

        entry.spent = total;
        entry.window_end = window_end;
        Ok(())
    }
}

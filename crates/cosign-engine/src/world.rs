//! Mutable chain state touched by transactions

use std::collections::HashMap;

use cosign_account::{AccountFactory, AccountParams, SmartAccount};
use cosign_ledger::TokenLedger;
use cosign_policy::SpendingLimitRegistry;
use cosign_sponsor::FeeSponsor;
use cosign_types::Address;
use tracing::info;

use crate::error::{EngineError, Result};

/// Everything a transaction may change.
///
/// Cloning the whole world is the snapshot mechanism: a failed transaction
/// restores the clone taken right after validation.
#[derive(Debug, Clone)]
pub struct WorldState {
    pub(crate) accounts: HashMap<Address, SmartAccount>,
    pub(crate) ledger: TokenLedger,
    pub(crate) limits: SpendingLimitRegistry,
    pub(crate) sponsors: HashMap<Address, FeeSponsor>,
}

impl WorldState {
    /// Empty world with a spending-limit registry at `registry`
    pub fn new(registry: Address, limit_window_secs: u64) -> Self {
        Self {
            accounts: HashMap::new(),
            ledger: TokenLedger::new(),
            limits: SpendingLimitRegistry::new(registry, limit_window_secs),
            sponsors: HashMap::new(),
        }
    }

    pub fn account(&self, address: &Address) -> Option<&SmartAccount> {
        self.accounts.get(address)
    }

    /// Nonce the account expects next
    pub fn nonce(&self, address: &Address) -> Option<u64> {
        self.accounts.get(address).map(SmartAccount::nonce)
    }

    /// Deploy an account through `factory`, returning its address
    pub fn deploy_account(
        &mut self,
        factory: &AccountFactory,
        salt: &[u8; 32],
        params: &AccountParams,
    ) -> Result<Address> {
        let address = factory.account_address(salt, params);
        if self.accounts.contains_key(&address) {
            return Err(EngineError::AccountExists(address));
        }
        self.accounts.insert(address, factory.instantiate(salt, params));
        info!(account = %address, factory = %factory.address(), "account deployed");
        Ok(address)
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TokenLedger {
        &mut self.ledger
    }

    pub fn limits(&self) -> &SpendingLimitRegistry {
        &self.limits
    }

    pub fn limits_mut(&mut self) -> &mut SpendingLimitRegistry {
        &mut self.limits
    }

    /// Install a sponsor, replacing any previous one at the same address
    pub fn add_sponsor(&mut self, sponsor: FeeSponsor) {
        self.sponsors.insert(sponsor.address(), sponsor);
    }

    pub fn sponsor(&self, address: &Address) -> Option<&FeeSponsor> {
        self.sponsors.get(address)
    }

    pub fn sponsor_mut(&mut self, address: &Address) -> Option<&mut FeeSponsor> {
        self.sponsors.get_mut(address)
    }
}

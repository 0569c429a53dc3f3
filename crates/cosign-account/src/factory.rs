//! Deterministic account deployment
//!
//! An account's address depends only on the factory, a salt and the
//! constructor arguments, so it can be computed (and funded) before the
//! account exists.

use cosign_crypto::{hash_all, keccak256};
use cosign_types::{Address, WordWriter};
use serde::{Deserialize, Serialize};

use crate::SmartAccount;

/// Prefix byte of the create2-style derivation
const CREATE2_PREFIX: u8 = 0xff;

/// Constructor arguments of a smart account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountParams {
    pub owner1: Address,
    pub owner2: Address,
    pub registry: Option<Address>,
}

impl AccountParams {
    pub fn new(owner1: Address, owner2: Address) -> Self {
        Self {
            owner1,
            owner2,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Address) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Word-encoded constructor arguments (a missing registry encodes as zero)
    pub fn encode(&self) -> Vec<u8> {
        WordWriter::new()
            .address(&self.owner1)
            .address(&self.owner2)
            .address(&self.registry.unwrap_or(Address::ZERO))
            .finish()
    }
}

/// Derive the address of an account deployed by `factory` with `salt`
pub fn derive_account_address(factory: &Address, salt: &[u8; 32], params: &AccountParams) -> Address {
    let args_hash = keccak256(&params.encode());
    let hash = hash_all(&[&[CREATE2_PREFIX], factory.as_bytes(), salt, &args_hash]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address(bytes)
}

/// Deploys smart accounts at derived addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFactory {
    address: Address,
}

impl AccountFactory {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Address an account with these parameters would get
    pub fn account_address(&self, salt: &[u8; 32], params: &AccountParams) -> Address {
        derive_account_address(&self.address, salt, params)
    }

    /// Build the account for these parameters at its derived address
    pub fn instantiate(&self, salt: &[u8; 32], params: &AccountParams) -> SmartAccount {
        SmartAccount::new(
            self.account_address(salt, params),
            params.owner1,
            params.owner2,
            params.registry,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORY: Address = Address([0xfa; 20]);

    fn params() -> AccountParams {
        AccountParams::new(Address([1; 20]), Address([2; 20]))
    }

    #[test]
    fn test_address_is_stable() {
        let factory = AccountFactory::new(FACTORY);
        let salt = [7u8; 32];
        assert_eq!(
            factory.account_address(&salt, &params()),
            factory.account_address(&salt, &params())
        );
        let account = factory.instantiate(&salt, &params());
        assert_eq!(account.address(), factory.account_address(&salt, &params()));
        assert_eq!(account.nonce(), 0);
    }

    #[test]
    fn test_address_depends_on_every_input() {
        let salt = [7u8; 32];
        let base = derive_account_address(&FACTORY, &salt, &params());

        assert_ne!(base, derive_account_address(&Address([0xfb; 20]), &salt, &params()));
        assert_ne!(base, derive_account_address(&FACTORY, &[8u8; 32], &params()));
        let swapped = AccountParams::new(Address([2; 20]), Address([1; 20]));
        assert_ne!(base, derive_account_address(&FACTORY, &salt, &swapped));
        let with_registry = params().with_registry(Address([0x0e; 20]));
        assert_ne!(base, derive_account_address(&FACTORY, &salt, &with_registry));
    }

    #[test]
    fn test_constructor_args_layout() {
        let encoded = params().encode();
        assert_eq!(encoded.len(), 96);
        assert!(encoded[64..].iter().all(|b| *b == 0));
    }
}

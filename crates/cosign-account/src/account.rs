//! Smart account state and validation

use cosign_crypto::{canonical_tx_hash, CryptoError, DualSignature};
use cosign_types::{Address, AuthError, Transaction, TxHash};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A dual-signer smart account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAccount {
    address: Address,
    /// owner1, owner2; order is part of the signature format
    owners: [Address; 2],
    nonce: u64,
    /// Spending-limit registry consulted before value movements
    registry: Option<Address>,
}

impl SmartAccount {
    /// Create an account at `address` with nonce zero
    pub fn new(address: Address, owner1: Address, owner2: Address, registry: Option<Address>) -> Self {
        Self {
            address,
            owners: [owner1, owner2],
            nonce: 0,
            registry,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owners(&self) -> &[Address; 2] {
        &self.owners
    }

    /// Nonce the next transaction must carry
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn registry(&self) -> Option<Address> {
        self.registry
    }

    /// Authorize `tx` and consume its nonce.
    ///
    /// Returns the canonical hash the owners signed. The nonce is only
    /// incremented when every check passes.
    pub fn validate(&mut self, tx: &Transaction, chain_id: u64) -> Result<TxHash, AuthError> {
        let next_nonce = self
            .nonce
            .checked_add(1)
            .filter(|_| tx.sender == self.address && tx.nonce == self.nonce);
        let Some(next_nonce) = next_nonce else {
            return Err(AuthError::NonceMismatch {
                account: self.address,
                sender: tx.sender,
                expected: self.nonce,
                actual: tx.nonce,
            });
        };

        let hash = canonical_tx_hash(tx, chain_id);
        let signatures = DualSignature::split(&tx.signature).map_err(|e| AuthError::MalformedSignature {
            reason: e.to_string(),
        })?;
        signatures
            .verify(&hash, &self.owners)
            .map_err(|e| match e {
                CryptoError::OwnerRejected { index, reason } => {
                    AuthError::InvalidSignature { index, reason }
                }
                other => AuthError::InvalidSignature {
                    index: 0,
                    reason: other.to_string(),
                },
            })?;

        self.nonce = next_nonce;
        debug!(account = %self.address, nonce = tx.nonce, tx_hash = %hash, "transaction validated");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_crypto::{KeyPair, RecoverableSignature};

    const CHAIN_ID: u64 = 270;

    struct Owners {
        one: KeyPair,
        two: KeyPair,
    }

    fn setup() -> (SmartAccount, Owners) {
        let one = KeyPair::from_label("account-test/owner-1").unwrap();
        let two = KeyPair::from_label("account-test/owner-2").unwrap();
        let account = SmartAccount::new(Address([0xac; 20]), one.address(), two.address(), None);
        (account, Owners { one, two })
    }

    fn unsigned(account: &SmartAccount, nonce: u64) -> Transaction {
        Transaction::new(account.address(), Address([0x22; 20]), nonce)
            .with_value(5)
            .with_fee(100, 1)
    }

    fn sign(tx: Transaction, first: &KeyPair, second: &KeyPair) -> Transaction {
        let hash = canonical_tx_hash(&tx, CHAIN_ID);
        let signature = DualSignature::sign(first, second, &hash).unwrap().pack();
        tx.with_signature(signature)
    }

    #[test]
    fn test_valid_transaction_bumps_nonce() {
        let (mut account, owners) = setup();
        let tx = sign(unsigned(&account, 0), &owners.one, &owners.two);
        let hash = account.validate(&tx, CHAIN_ID).unwrap();
        assert_eq!(hash, canonical_tx_hash(&tx, CHAIN_ID));
        assert_eq!(account.nonce(), 1);

        let tx = sign(unsigned(&account, 1), &owners.one, &owners.two);
        account.validate(&tx, CHAIN_ID).unwrap();
        assert_eq!(account.nonce(), 2);
    }

    #[test]
    fn test_replay_is_nonce_mismatch() {
        let (mut account, owners) = setup();
        let tx = sign(unsigned(&account, 0), &owners.one, &owners.two);
        account.validate(&tx, CHAIN_ID).unwrap();
        let err = account.validate(&tx, CHAIN_ID).unwrap_err();
        assert_eq!(
            err,
            AuthError::NonceMismatch {
                account: account.address(),
                sender: account.address(),
                expected: 1,
                actual: 0,
            }
        );
        assert_eq!(account.nonce(), 1);
    }

    #[test]
    fn test_future_nonce_rejected() {
        let (mut account, owners) = setup();
        let tx = sign(unsigned(&account, 3), &owners.one, &owners.two);
        assert_eq!(account.validate(&tx, CHAIN_ID).unwrap_err().error_code(), "NONCE_MISMATCH");
        assert_eq!(account.nonce(), 0);
    }

    #[test]
    fn test_sender_mismatch_rejected() {
        let (mut account, owners) = setup();
        let tx = Transaction::new(Address([0xbb; 20]), Address([0x22; 20]), 0);
        let tx = sign(tx, &owners.one, &owners.two);
        assert!(matches!(
            account.validate(&tx, CHAIN_ID),
            Err(AuthError::NonceMismatch { .. })
        ));
    }

    #[test]
    fn test_swapped_signatures_rejected() {
        let (mut account, owners) = setup();
        let tx = sign(unsigned(&account, 0), &owners.two, &owners.one);
        assert!(matches!(
            account.validate(&tx, CHAIN_ID),
            Err(AuthError::InvalidSignature { index: 0, .. })
        ));
        assert_eq!(account.nonce(), 0);
    }

    #[test]
    fn test_single_owner_rejected() {
        let (mut account, owners) = setup();
        let tx = sign(unsigned(&account, 0), &owners.one, &owners.one);
        assert!(matches!(
            account.validate(&tx, CHAIN_ID),
            Err(AuthError::InvalidSignature { index: 1, .. })
        ));

        // owner1 alone, without a second sub-signature
        let tx = unsigned(&account, 0);
        let hash = canonical_tx_hash(&tx, CHAIN_ID);
        let lone = RecoverableSignature::sign(&owners.one, &hash).unwrap();
        let tx = tx.with_signature(lone.0.to_vec());
        assert!(matches!(
            account.validate(&tx, CHAIN_ID),
            Err(AuthError::MalformedSignature { .. })
        ));
    }

    #[test]
    fn test_signature_for_other_chain_rejected() {
        let (mut account, owners) = setup();
        let tx = unsigned(&account, 0);
        let hash = canonical_tx_hash(&tx, CHAIN_ID + 1);
        let signature = DualSignature::sign(&owners.one, &owners.two, &hash).unwrap().pack();
        let tx = tx.with_signature(signature);
        assert!(matches!(
            account.validate(&tx, CHAIN_ID),
            Err(AuthError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_tampered_field_rejected() {
        let (mut account, owners) = setup();
        let mut tx = sign(unsigned(&account, 0), &owners.one, &owners.two);
        tx.value = 6;
        assert!(matches!(
            account.validate(&tx, CHAIN_ID),
            Err(AuthError::InvalidSignature { .. })
        ));
    }
}

//! Key management for Cosign
//!
//! Owners are secp256k1 keys identified by their Ethereum-style address:
//! the last 20 bytes of `keccak256(x || y)` of the uncompressed public key.

use crate::hash::keccak256;
use crate::{CryptoError, CryptoResult};
use cosign_types::Address;
use k256::ecdsa::{SigningKey, VerifyingKey};

/// blake3 context for label-derived keys
const LABEL_KEY_CONTEXT: &str = "cosign owner key from label v1";

/// A secp256k1 key pair
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Create from existing signing key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> CryptoResult<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        let address = address_of(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Derive a deterministic key pair from a human-readable label.
    ///
    /// Intended for fixtures and local simulation; the same label always
    /// yields the same key.
    pub fn from_label(label: &str) -> CryptoResult<Self> {
        let seed = blake3::derive_key(LABEL_KEY_CONTEXT, label.as_bytes());
        Self::from_bytes(&seed)
    }

    /// Get the signing key (private - never expose!)
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Get the verifying key (public)
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The owner identity of this key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the compressed public key as hex string
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().to_encoded_point(true).as_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Derive the address of a public key
pub fn address_of(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // skip the 0x04 prefix, hash x || y
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_address() {
        // private key 1 → generator point
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let keypair = KeyPair::from_bytes(&bytes).unwrap();
        assert_eq!(
            keypair.address().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_label_keys_are_deterministic() {
        let a = KeyPair::from_label("alice").unwrap();
        let b = KeyPair::from_label("alice").unwrap();
        let c = KeyPair::from_label("bob").unwrap();
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
        assert_eq!(a.public_key_hex().len(), 66);
    }

    #[test]
    fn test_zero_key_rejected() {
        assert!(matches!(
            KeyPair::from_bytes(&[0u8; 32]),
            Err(CryptoError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = KeyPair::from_label("alice").unwrap();
        let debug = format!("{:?}", keypair);
        assert!(debug.contains("address"));
        assert!(!debug.contains("signing_key"));
    }
}

//! Recoverable signatures for Cosign
//!
//! A sub-signature is 65 bytes `r || s || v`. The signature field of a
//! transaction is exactly two sub-signatures, owner1 first.

use crate::keys::address_of;
use crate::{CryptoError, CryptoResult, KeyPair};
use cosign_types::{Address, TxHash};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

/// Length of one recoverable sub-signature
pub const SIGNATURE_LEN: usize = 65;

/// Length of the packed owner1 || owner2 signature field
pub const DUAL_SIGNATURE_LEN: usize = 2 * SIGNATURE_LEN;

/// Offset added to the recovery id in the `v` byte
const V_OFFSET: u8 = 27;

/// A 65-byte secp256k1 signature with recovery id
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature(pub [u8; SIGNATURE_LEN]);

impl RecoverableSignature {
    /// Sign a 32-byte prehash
    pub fn sign(keypair: &KeyPair, hash: &TxHash) -> CryptoResult<Self> {
        let (signature, recovery_id) = keypair
            .signing_key()
            .sign_prehash_recoverable(hash.as_bytes())
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + V_OFFSET;
        Ok(Self(bytes))
    }

    /// Create from a slice of exactly 65 bytes
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::MalformedSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Recover the signer's address.
    ///
    /// High-`s` signatures are rejected so each message has one valid encoding
    /// per signer.
    pub fn recover(&self, hash: &TxHash) -> CryptoResult<Address> {
        let signature = Signature::from_slice(&self.0[..64])
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        if signature.normalize_s().is_some() {
            return Err(CryptoError::InvalidSignature("non-canonical high s".into()));
        }

        let v = self.0[64];
        let recovery_byte = if v >= V_OFFSET { v - V_OFFSET } else { v };
        let recovery_id = RecoveryId::from_byte(recovery_byte)
            .filter(|id| !id.is_x_reduced())
            .ok_or_else(|| CryptoError::InvalidSignature(format!("invalid v byte {}", v)))?;

        let key = VerifyingKey::recover_from_prehash(hash.as_bytes(), &signature, recovery_id)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok(address_of(&key))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature(0x{})", hex::encode(self.0))
    }
}

/// The owner1 || owner2 signature pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualSignature {
    pub first: RecoverableSignature,
    pub second: RecoverableSignature,
}

impl DualSignature {
    /// Sign a hash with both owners, in order
    pub fn sign(owner1: &KeyPair, owner2: &KeyPair, hash: &TxHash) -> CryptoResult<Self> {
        Ok(Self {
            first: RecoverableSignature::sign(owner1, hash)?,
            second: RecoverableSignature::sign(owner2, hash)?,
        })
    }

    /// Split a signature field into its two sub-signatures
    pub fn split(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != DUAL_SIGNATURE_LEN {
            return Err(CryptoError::MalformedSignature(format!(
                "expected {} bytes, got {}",
                DUAL_SIGNATURE_LEN,
                bytes.len()
            )));
        }
        let (first, second) = bytes.split_at(SIGNATURE_LEN);
        Ok(Self {
            first: RecoverableSignature::from_slice(first)?,
            second: RecoverableSignature::from_slice(second)?,
        })
    }

    /// Concatenate into the wire signature field
    pub fn pack(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(DUAL_SIGNATURE_LEN);
        bytes.extend_from_slice(&self.first.0);
        bytes.extend_from_slice(&self.second.0);
        bytes
    }

    /// Verify that sub-signature `i` recovers to `owners[i]`, for both `i`.
    pub fn verify(&self, hash: &TxHash, owners: &[Address; 2]) -> CryptoResult<()> {
        for (index, (signature, owner)) in [self.first, self.second].iter().zip(owners).enumerate() {
            let recovered = signature
                .recover(hash)
                .map_err(|e| CryptoError::OwnerRejected {
                    index,
                    reason: e.to_string(),
                })?;
            if recovered != *owner {
                return Err(CryptoError::OwnerRejected {
                    index,
                    reason: format!("recovered {}, expected {}", recovered, owner),
                });
            }
        }
        Ok(())
    }
}

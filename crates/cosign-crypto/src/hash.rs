//! Hashing utilities for Cosign

use cosign_types::{Transaction, TxHash};
use sha3::{Digest, Keccak256};

/// Domain tag prefixed to every signed transaction hash
pub const DOMAIN_TAG: &[u8] = b"cosign:tx:v1";

/// Compute Keccak-256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute Keccak-256 hash and return as hex string
pub fn keccak256_hex(data: &[u8]) -> String {
    hex::encode(keccak256(data))
}

/// Compute hash of multiple items
pub fn hash_all(items: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for item in items {
        hasher.update(item);
    }
    hasher.finalize().into()
}

/// Canonical hash a transaction's owners sign.
///
/// Covers the domain tag, the chain id and every envelope field except the
/// signature. The sender is part of the envelope, so a signature for one
/// account never validates for another.
pub fn canonical_tx_hash(tx: &Transaction, chain_id: u64) -> TxHash {
    TxHash(hash_all(&[
        DOMAIN_TAG,
        &chain_id.to_be_bytes(),
        &tx.signing_bytes(),
    ]))
}

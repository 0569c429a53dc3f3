//! Cosign Crypto - Cryptographic primitives for dual-signer smart accounts
//!
//! This crate provides:
//! - Keccak-256 hashing and the domain-separated canonical transaction hash
//! - secp256k1 key pairs with Ethereum-style addresses
//! - 65-byte recoverable signatures and the owner1-then-owner2 dual signature
//!
//! # Security Invariant
//!
//! **A dual signature is valid only if BOTH sub-signatures recover to their
//! owner, in order.** There is no quorum counting.

pub mod hash;
pub mod keys;
pub mod signature;

pub use hash::*;
pub use keys::*;
pub use signature::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Owner #{index} rejected: {reason}")]
    OwnerRejected { index: usize, reason: String },
}

pub type CryptoResult<T> = Result<T, CryptoError>;

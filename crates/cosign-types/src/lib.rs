//! Cosign Types - Canonical domain types for dual-signer smart accounts
//!
//! This crate contains all foundational types for Cosign with zero dependencies
//! on other cosign crates. It defines:
//!
//! - Identity types (Address, TxHash, AssetId)
//! - The transaction envelope and sponsor parameters
//! - The word-oriented wire codec and call payloads
//! - The error taxonomy shared by every layer
//!
//! # Architectural Invariants
//!
//! 1. The signature never covers itself: `Transaction::signing_bytes` excludes it
//! 2. Every outgoing call is authorized by BOTH owners, in owner1-then-owner2 order
//! 3. A transaction commits completely or not at all (only the nonce bump is sticky)
//! 4. Time is always an explicit input, never read from a clock
//!
//! # Transaction Flow
//!
//! ```text
//! validate → prevalidateAndCharge → execute → postOperation
//! ```

pub mod identity;
pub mod abi;
pub mod calldata;
pub mod transaction;
pub mod error;

pub use identity::*;
pub use abi::{DecodeError, DecodeResult, WordReader, WordWriter, WORD};
pub use calldata::{BatchEntry, Call, Selector};
pub use transaction::*;
pub use error::*;

/// Version of the Cosign types schema
pub const TYPES_VERSION: &str = "0.1.0";

/// Seconds since the Unix epoch, supplied by the executor
pub type Timestamp = u64;

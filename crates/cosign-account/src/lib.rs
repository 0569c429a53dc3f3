//! Cosign Account - Dual-signer smart accounts
//!
//! A smart account replaces a single private key with a fixed pair of owners.
//! Every transaction must carry both owners' signatures, owner1 first, and the
//! account's current nonce. Value-moving calls are additionally checked
//! against the account's rolling spending limits.
//!
//! # Modules
//!
//! - `account`: the account state and transaction validation
//! - `execute`: call dispatch against the token ledger and limit registry
//! - `factory`: deterministic account addresses

pub mod account;
pub mod execute;
pub mod factory;

pub use account::*;
pub use execute::*;
pub use factory::*;

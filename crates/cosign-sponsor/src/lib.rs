//! Cosign Sponsor - Fee sponsorship for smart-account transactions
//!
//! A sponsor (paymaster) advances the network fee of a transaction in native
//! currency. In `General` mode it absorbs the cost. In `ApprovalBased` mode it
//! recoups the fee by pulling an accepted token from the account, priced by a
//! read-only oracle.
//!
//! # Fee Flow
//!
//! ```text
//! prevalidate_and_charge:  account ──tokens──► sponsor ──native──► fee sink
//! post_operation:          fee sink ──unused native──► sponsor ──excess tokens──► account
//! ```

pub mod oracle;
pub mod sponsor;

pub use oracle::*;
pub use sponsor::*;

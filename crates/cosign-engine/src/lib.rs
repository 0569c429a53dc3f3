//! Cosign Engine - Atomic application of smart-account transactions
//!
//! The engine owns the world state (accounts, token ledger, spending-limit
//! registry, sponsors) and applies one transaction at a time:
//!
//! ```text
//! validate ──► snapshot ──► charge fee ──► execute ──► settle ──► commit
//!    │                          │             │           │
//!    └─ reject (no change)      └─────────────┴───────────┴─► restore snapshot
//! ```
//!
//! # Invariants
//!
//! - A transaction either commits every effect or none, except that a
//!   validated nonce stays consumed.
//! - "Now" is the block timestamp passed in by the caller; the engine never
//!   reads a clock.
//! - Oracles are consulted read-only.

pub mod config;
pub mod error;
pub mod executor;
pub mod world;

pub use config::EngineConfig;
pub use error::{ClientAction, EngineError, Result};
pub use executor::{BlockContext, Engine, TxOutcome};
pub use world::WorldState;

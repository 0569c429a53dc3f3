//! Error taxonomy for Cosign
//!
//! Every failure is terminal for the transaction in which it occurs. The kinds
//! are kept distinct so a client can tell a signature problem from a funding
//! or policy problem.

use crate::{Address, AssetId};
use thiserror::Error;

// ============================================================================
// Authorization
// ============================================================================

/// Errors raised while validating a transaction's authorization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Nonce (or sender) does not match the account's state
    #[error("nonce mismatch for {account}: tx sender {sender} nonce {actual}, expected nonce {expected}")]
    NonceMismatch {
        account: Address,
        sender: Address,
        expected: u64,
        actual: u64,
    },

    /// A sub-signature did not recover to its owner
    #[error("invalid signature for owner #{index}: {reason}")]
    InvalidSignature { index: usize, reason: String },

    /// The signature field cannot be split into two sub-signatures
    #[error("malformed signature: {reason}")]
    MalformedSignature { reason: String },
}

impl AuthError {
    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonceMismatch { .. } => "NONCE_MISMATCH",
            Self::InvalidSignature { .. } => "INVALID_SIGNATURE",
            Self::MalformedSignature { .. } => "MALFORMED_SIGNATURE",
        }
    }
}

// ============================================================================
// Spending limits
// ============================================================================

/// Errors raised by the spending-limit registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("spending limit exceeded for {account} on {asset}: requested {requested}, remaining {remaining}")]
    LimitExceeded {
        account: Address,
        asset: AssetId,
        requested: u128,
        remaining: u128,
    },
}

impl LimitError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::LimitExceeded { .. } => "LIMIT_EXCEEDED",
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Errors raised while executing a validated transaction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// Caller is not permitted to perform this call
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// A dispatched call failed at its target
    #[error("call to {target} failed: {reason}")]
    TargetCallFailed { target: Address, reason: String },

    /// A value movement would exceed the rolling limit
    #[error(transparent)]
    SpendingLimitExceeded(#[from] LimitError),
}

impl ExecError {
    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a target call failure
    pub fn call_failed(target: Address, reason: impl ToString) -> Self {
        Self::TargetCallFailed {
            target,
            reason: reason.to_string(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::TargetCallFailed { .. } => "TARGET_CALL_FAILED",
            Self::SpendingLimitExceeded(_) => "SPENDING_LIMIT_EXCEEDED",
        }
    }
}

// ============================================================================
// Fee sponsorship
// ============================================================================

/// Errors raised by a fee sponsor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SponsorError {
    /// Asset is not configured, not sponsored, or has no usable rate
    #[error("unsupported asset {asset}: {reason}")]
    UnsupportedAsset { asset: AssetId, reason: String },

    /// Allowance granted to the sponsor is below what the transaction requires
    #[error("insufficient allowance on {asset}: required {required}, actual {actual}")]
    InsufficientAllowance {
        asset: AssetId,
        required: u128,
        actual: u128,
    },

    /// The fee could not be collected or advanced
    #[error("fee charge failed: {reason}")]
    ChargeFailed { reason: String },

    /// Administrative call from someone other than the sponsor's administrator
    #[error("{caller} is not the sponsor administrator")]
    NotAdministrator { caller: Address },
}

impl SponsorError {
    /// Create a charge failure
    pub fn charge_failed(reason: impl ToString) -> Self {
        Self::ChargeFailed {
            reason: reason.to_string(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedAsset { .. } => "UNSUPPORTED_ASSET",
            Self::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            Self::ChargeFailed { .. } => "CHARGE_FAILED",
            Self::NotAdministrator { .. } => "NOT_ADMINISTRATOR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_error_converts_into_exec_error() {
        let err: ExecError = LimitError::LimitExceeded {
            account: Address([1; 20]),
            asset: Address([2; 20]),
            requested: 6,
            remaining: 5,
        }
        .into();
        assert_eq!(err.error_code(), "SPENDING_LIMIT_EXCEEDED");
        assert!(err.to_string().contains("requested 6, remaining 5"));
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            AuthError::MalformedSignature { reason: String::new() }.error_code(),
            AuthError::InvalidSignature { index: 0, reason: String::new() }.error_code(),
            ExecError::unauthorized("x").error_code(),
            SponsorError::charge_failed("x").error_code(),
            SponsorError::NotAdministrator { caller: Address::ZERO }.error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}

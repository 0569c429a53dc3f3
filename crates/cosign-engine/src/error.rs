//! Engine errors
//!
//! Wraps the per-phase taxonomy and tells a client what to do next.

use cosign_types::{Address, AuthError, DecodeError, ExecError, SponsorError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Why a transaction (or an engine setup call) was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("execution failed: {0}")]
    Exec(#[from] ExecError),

    #[error("sponsorship failed: {0}")]
    Sponsor(#[from] SponsorError),

    #[error("unknown account {0}")]
    UnknownAccount(Address),

    #[error("unknown sponsor {0}")]
    UnknownSponsor(Address),

    #[error("account already deployed at {0}")]
    AccountExists(Address),

    #[error("fee payment failed for {account}: {reason}")]
    FeePaymentFailed { account: Address, reason: String },

    #[error("fee overflow: {fee_limit} units at {fee_per_unit} per unit")]
    FeeOverflow { fee_limit: u128, fee_per_unit: u128 },

    #[error("malformed transaction: {0}")]
    Decode(#[from] DecodeError),
}

/// What a client should do after a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientAction {
    /// Re-sign with both owners and the current nonce
    ReSign,
    /// Grant the sponsor a larger token allowance
    TopUpAllowance,
    /// Fund the paying balance
    TopUpBalance,
    /// Wait for the spending window to roll over
    WaitForWindow,
    /// Change the request itself
    FixRequest,
}

impl EngineError {
    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.error_code(),
            Self::Exec(e) => e.error_code(),
            Self::Sponsor(e) => e.error_code(),
            Self::UnknownAccount(_) => "UNKNOWN_ACCOUNT",
            Self::UnknownSponsor(_) => "UNKNOWN_SPONSOR",
            Self::AccountExists(_) => "ACCOUNT_EXISTS",
            Self::FeePaymentFailed { .. } => "FEE_PAYMENT_FAILED",
            Self::FeeOverflow { .. } => "FEE_OVERFLOW",
            Self::Decode(_) => "DECODE_ERROR",
        }
    }

    /// Suggested next step for the submitting client
    pub fn client_action(&self) -> ClientAction {
        match self {
            Self::Auth(_) => ClientAction::ReSign,
            Self::Exec(ExecError::SpendingLimitExceeded(_)) => ClientAction::WaitForWindow,
            Self::Sponsor(SponsorError::InsufficientAllowance { .. }) => ClientAction::TopUpAllowance,
            Self::Sponsor(SponsorError::ChargeFailed { .. }) | Self::FeePaymentFailed { .. } => {
                ClientAction::TopUpBalance
            }
            _ => ClientAction::FixRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_types::LimitError;

    #[test]
    fn test_client_actions_distinguish_failures() {
        let auth: EngineError = AuthError::InvalidSignature {
            index: 1,
            reason: "mismatch".into(),
        }
        .into();
        assert_eq!(auth.client_action(), ClientAction::ReSign);
        assert_eq!(auth.error_code(), "INVALID_SIGNATURE");

        let limit: EngineError = ExecError::from(LimitError::LimitExceeded {
            account: Address::ZERO,
            asset: Address::NATIVE_ASSET,
            requested: 2,
            remaining: 1,
        })
        .into();
        assert_eq!(limit.client_action(), ClientAction::WaitForWindow);

        let allowance: EngineError = SponsorError::InsufficientAllowance {
            asset: Address::ZERO,
            required: 10,
            actual: 1,
        }
        .into();
        assert_eq!(allowance.client_action(), ClientAction::TopUpAllowance);

        let unauthorized: EngineError = ExecError::unauthorized("nope").into();
        assert_eq!(unauthorized.client_action(), ClientAction::FixRequest);
        assert_eq!(unauthorized.error_code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = EngineError::FeeOverflow {
            fee_limit: 3,
            fee_per_unit: 4,
        };
        assert_eq!(err.to_string(), "fee overflow: 3 units at 4 per unit");
    }
}

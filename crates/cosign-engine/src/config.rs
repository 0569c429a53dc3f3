//! Engine configuration

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chain id mixed into every signed hash
    pub chain_id: u64,
    /// Default spending-limit window in seconds
    pub limit_window_secs: u64,
    /// Oldest oracle quote a sponsor will price with, in seconds
    pub oracle_max_age_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: 270,
            limit_window_secs: 86_400,
            oracle_max_age_secs: 3_600,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };
        Self {
            chain_id: parse("COSIGN_CHAIN_ID", defaults.chain_id),
            limit_window_secs: parse("COSIGN_LIMIT_WINDOW_SECS", defaults.limit_window_secs),
            oracle_max_age_secs: parse("COSIGN_ORACLE_MAX_AGE_SECS", defaults.oracle_max_age_secs),
        }
    }
}

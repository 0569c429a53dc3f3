//! Price oracles
//!
//! An oracle quotes a token's value as native units per whole token, scaled by
//! `10^decimals`. Oracles are external read-only services: nothing in a
//! transaction mutates them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cosign_types::{Address, AssetId, Timestamp};
use serde::{Deserialize, Serialize};

/// A rate observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Native units per token, scaled by `10^decimals`
    pub rate: u128,
    /// When the rate was observed
    pub updated_at: Timestamp,
}

/// Read-only price feed
pub trait PriceOracle: Send + Sync + fmt::Debug {
    /// Latest quote for `asset`, `None` if the feed does not cover it
    fn quote(&self, asset: &AssetId) -> Option<PriceQuote>;

    /// Fixed-point scale of every quoted rate
    fn decimals(&self) -> u8;
}

/// Oracle with administratively set rates
#[derive(Debug, Clone, Default)]
pub struct FixedRateOracle {
    decimals: u8,
    quotes: HashMap<AssetId, PriceQuote>,
}

impl FixedRateOracle {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals,
            quotes: HashMap::new(),
        }
    }

    /// Builder form of [`FixedRateOracle::set_rate`]
    pub fn with_rate(mut self, asset: AssetId, rate: u128, updated_at: Timestamp) -> Self {
        self.set_rate(asset, rate, updated_at);
        self
    }

    pub fn set_rate(&mut self, asset: AssetId, rate: u128, updated_at: Timestamp) {
        self.quotes.insert(asset, PriceQuote { rate, updated_at });
    }
}

impl PriceOracle for FixedRateOracle {
    fn quote(&self, asset: &AssetId) -> Option<PriceQuote> {
        self.quotes.get(asset).copied()
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }
}

/// Oracles reachable by address
#[derive(Debug, Clone, Default)]
pub struct OracleRegistry {
    oracles: HashMap<Address, Arc<dyn PriceOracle>>,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `oracle` reachable at `address` (replaces any previous one)
    pub fn register(&mut self, address: Address, oracle: Arc<dyn PriceOracle>) {
        self.oracles.insert(address, oracle);
    }

    pub fn get(&self, address: &Address) -> Option<&dyn PriceOracle> {
        match self.oracles.get(address) {
            Some(oracle) => Some(oracle.as_ref()),
            None => None,
        }
    }
}

/// Token amount worth `fee` native units: `fee * 10^decimals / rate`,
/// truncated. `None` on a zero rate or overflow.
pub fn tokens_for_fee(fee: u128, rate: u128, decimals: u8) -> Option<u128> {
    if rate == 0 {
        return None;
    }
    let scale = 10u128.checked_pow(u32::from(decimals))?;
    fee.checked_mul(scale).map(|scaled| scaled / rate)
}

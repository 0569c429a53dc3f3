//! Identity types for Cosign
//!
//! Addresses and hashes are strongly typed fixed-size byte wrappers so an
//! account address can never be confused with a transaction hash.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing identity values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Macro to generate fixed-width byte identity types with common implementations
macro_rules! define_bytes_type {
    ($name:ident, $len:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes
            pub const LEN: usize = $len;

            /// The all-zero value
            pub const ZERO: Self = Self([0u8; $len]);

            /// Create from a slice of exactly `LEN` bytes
            pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
                let array: [u8; $len] =
                    bytes.try_into().map_err(|_| IdentityError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    })?;
                Ok(Self(array))
            }

            /// Parse from a hex string (with or without `0x` prefix)
            pub fn parse(s: &str) -> Result<Self, IdentityError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s).map_err(|e| IdentityError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            /// Get the raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Check if this is the all-zero value
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdentityError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_bytes_type!(Address, 20, "A 20-byte account, contract or token address");
define_bytes_type!(TxHash, 32, "A 32-byte canonical transaction hash");

/// Assets are identified by the address of their ledger entry
pub type AssetId = Address;

const fn system_address(low: u16) -> Address {
    let mut bytes = [0u8; 20];
    bytes[18] = (low >> 8) as u8;
    bytes[19] = low as u8;
    Address(bytes)
}

impl Address {
    /// Reserved address of the native currency in the token ledger
    pub const NATIVE_ASSET: Address = system_address(0x800a);

    /// Reserved fee sink that receives network fees
    pub const BOOTLOADER: Address = system_address(0x8001);

    /// Check if this address is reserved for the execution environment
    pub fn is_system(&self) -> bool {
        self.0[..18].iter().all(|b| *b == 0) && self.0[18] >= 0x80
    }
}

/// Serde helper encoding `Vec<u8>` as a `0x`-prefixed hex string
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_parse() {
        let addr = Address([0xab; 20]);
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 42);
        assert_eq!(Address::parse(&s).unwrap(), addr);
        assert_eq!(Address::parse(&s[2..]).unwrap(), addr);
    }

    #[test]
    fn test_address_wrong_length() {
        let err = Address::parse("0x1234").unwrap_err();
        assert_eq!(
            err,
            IdentityError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn test_reserved_addresses() {
        assert_eq!(
            Address::NATIVE_ASSET.to_string(),
            "0x000000000000000000000000000000000000800a"
        );
        assert!(Address::NATIVE_ASSET.is_system());
        assert!(Address::BOOTLOADER.is_system());
        assert!(!Address([1; 20]).is_system());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = TxHash([7; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash));
        let back: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}

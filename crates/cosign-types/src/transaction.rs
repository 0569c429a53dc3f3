//! Transaction envelope for Cosign
//!
//! A transaction carries everything the executor needs to authorize, finance
//! and execute one call from a smart account. The `signature` field is never
//! part of the bytes that get signed.

use crate::abi::{DecodeError, DecodeResult, WordReader, WordWriter};
use crate::{Address, AssetId};
use serde::{Deserialize, Serialize};

const MODE_NONE: u128 = 0;
const MODE_GENERAL: u128 = 1;
const MODE_APPROVAL_BASED: u128 = 2;

/// How a sponsor finances the transaction fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SponsorMode {
    /// The sponsor pays unconditionally
    General,
    /// The sponsor pays in native currency and recoups the fee in `asset`
    ApprovalBased {
        asset: AssetId,
        /// Minimum allowance the account grants the sponsor on `asset`
        min_allowance: u128,
        /// Opaque mode data; a single word is read as the client's quoted rate
        #[serde(with = "crate::hex_bytes")]
        extra: Vec<u8>,
    },
}

impl SponsorMode {
    fn discriminant(&self) -> u128 {
        match self {
            Self::General => MODE_GENERAL,
            Self::ApprovalBased { .. } => MODE_APPROVAL_BASED,
        }
    }
}

/// Sponsor block of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorParams {
    /// Address of the sponsor contract
    pub sponsor: Address,
    pub mode: SponsorMode,
}

impl SponsorParams {
    /// Unconditional sponsorship
    pub fn general(sponsor: Address) -> Self {
        Self {
            sponsor,
            mode: SponsorMode::General,
        }
    }

    /// Token-financed sponsorship
    pub fn approval_based(sponsor: Address, asset: AssetId, min_allowance: u128) -> Self {
        Self {
            sponsor,
            mode: SponsorMode::ApprovalBased {
                asset,
                min_allowance,
                extra: Vec::new(),
            },
        }
    }

    /// Attach the rate the client observed when signing
    pub fn with_quoted_rate(mut self, rate: u128) -> Self {
        if let SponsorMode::ApprovalBased { extra, .. } = &mut self.mode {
            *extra = WordWriter::new().uint(rate).finish();
        }
        self
    }
}

/// A smart-account transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Originating smart account
    pub sender: Address,
    /// Call target
    pub to: Address,
    /// Native value sent with the call
    pub value: u128,
    /// Call payload
    #[serde(with = "crate::hex_bytes")]
    pub data: Vec<u8>,
    /// Must equal the sender's nonce at validation time
    pub nonce: u64,
    /// Maximum fee units the transaction may consume
    pub fee_limit: u128,
    /// Price of one fee unit in native currency
    pub fee_per_unit: u128,
    pub sponsor: Option<SponsorParams>,
    /// owner1 sub-signature followed by owner2 sub-signature
    #[serde(with = "crate::hex_bytes")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Create an unsigned transaction with no value, payload or fee
    pub fn new(sender: Address, to: Address, nonce: u64) -> Self {
        Self {
            sender,
            to,
            value: 0,
            data: Vec::new(),
            nonce,
            fee_limit: 0,
            fee_per_unit: 0,
            sponsor: None,
            signature: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn with_fee(mut self, fee_limit: u128, fee_per_unit: u128) -> Self {
        self.fee_limit = fee_limit;
        self.fee_per_unit = fee_per_unit;
        self
    }

    pub fn with_sponsor(mut self, sponsor: SponsorParams) -> Self {
        self.sponsor = Some(sponsor);
        self
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Upper bound of the fee in native currency (`None` on overflow)
    pub fn max_fee(&self) -> Option<u128> {
        self.fee_limit.checked_mul(self.fee_per_unit)
    }

    /// Check if a sponsor finances this transaction
    pub fn is_sponsored(&self) -> bool {
        self.sponsor.is_some()
    }

    fn write_unsigned(&self, writer: &mut WordWriter) {
        writer
            .address(&self.sender)
            .address(&self.to)
            .uint(self.value)
            .uint(self.nonce as u128)
            .uint(self.fee_limit)
            .uint(self.fee_per_unit)
            .bytes(&self.data);

        match &self.sponsor {
            None => {
                writer.uint(MODE_NONE);
            }
            Some(params) => {
                writer
                    .uint(params.mode.discriminant())
                    .address(&params.sponsor);
                if let SponsorMode::ApprovalBased {
                    asset,
                    min_allowance,
                    extra,
                } = &params.mode
                {
                    writer.address(asset).uint(*min_allowance).bytes(extra);
                }
            }
        }
    }

    /// Bytes covered by the signature: every field except `signature`
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut writer = WordWriter::new();
        self.write_unsigned(&mut writer);
        writer.finish()
    }

    /// Full wire encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = WordWriter::new();
        self.write_unsigned(&mut writer);
        writer.bytes(&self.signature);
        writer.finish()
    }

    /// Decode a full wire encoding, rejecting trailing bytes
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        let mut reader = WordReader::new(bytes);
        let sender = reader.address()?;
        let to = reader.address()?;
        let value = reader.uint()?;
        let nonce = reader.uint64()?;
        let fee_limit = reader.uint()?;
        let fee_per_unit = reader.uint()?;
        let data = reader.bytes()?;

        let sponsor = match reader.uint()? {
            MODE_NONE => None,
            MODE_GENERAL => Some(SponsorParams::general(reader.address()?)),
            MODE_APPROVAL_BASED => {
                let sponsor = reader.address()?;
                Some(SponsorParams {
                    sponsor,
                    mode: SponsorMode::ApprovalBased {
                        asset: reader.address()?,
                        min_allowance: reader.uint()?,
                        extra: reader.bytes()?,
                    },
                })
            }
            other => {
                return Err(DecodeError::InvalidDiscriminant {
                    field: "sponsor mode",
                    value: other,
                })
            }
        };

        let signature = reader.bytes()?;
        reader.finish()?;

        Ok(Self {
            sender,
            to,
            value,
            data,
            nonce,
            fee_limit,
            fee_per_unit,
            sponsor,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction::new(Address([1; 20]), Address([2; 20]), 7)
            .with_value(1_000)
            .with_data(vec![0xaa; 37])
            .with_fee(21_000, 3)
            .with_sponsor(
                SponsorParams::approval_based(Address([3; 20]), Address([4; 20]), 500)
                    .with_quoted_rate(2),
            )
            .with_signature(vec![9; 130])
    }

    #[test]
    fn test_encode_decode() {
        let tx = sample();
        assert_eq!(Transaction::decode(&tx.encode()).unwrap(), tx);

        let plain = Transaction::new(Address([1; 20]), Address([2; 20]), 0);
        assert_eq!(Transaction::decode(&plain.encode()).unwrap(), plain);

        let general = plain.clone().with_sponsor(SponsorParams::general(Address([5; 20])));
        assert_eq!(Transaction::decode(&general.encode()).unwrap(), general);
    }

    #[test]
    fn test_signature_not_signed() {
        let tx = sample();
        let resigned = tx.clone().with_signature(vec![1; 130]);
        assert_eq!(tx.signing_bytes(), resigned.signing_bytes());
        assert_ne!(tx.encode(), resigned.encode());
    }

    #[test]
    fn test_every_other_field_is_signed() {
        let base = sample();
        let variants = [
            base.clone().with_value(1_001),
            base.clone().with_fee(21_000, 4),
            Transaction { nonce: 8, ..base.clone() },
            Transaction { sender: Address([9; 20]), ..base.clone() },
            base.clone().with_sponsor(SponsorParams::general(Address([3; 20]))),
        ];
        for variant in variants {
            assert_ne!(variant.signing_bytes(), base.signing_bytes());
        }
    }

    #[test]
    fn test_unknown_sponsor_mode_rejected() {
        let mut bytes = Transaction::new(Address([1; 20]), Address([2; 20]), 0).signing_bytes();
        let mode_word = bytes.len() - 32;
        bytes[mode_word + 31] = 3;
        bytes.extend(WordWriter::new().bytes(&[]).finish());
        assert_eq!(
            Transaction::decode(&bytes).unwrap_err(),
            DecodeError::InvalidDiscriminant {
                field: "sponsor mode",
                value: 3
            }
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample().encode();
        bytes.push(0);
        assert!(matches!(
            Transaction::decode(&bytes),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        ));
    }

    #[test]
    fn test_max_fee_overflow() {
        let tx = Transaction::new(Address::ZERO, Address::ZERO, 0).with_fee(u128::MAX, 2);
        assert_eq!(tx.max_fee(), None);
        assert_eq!(sample().max_fee(), Some(63_000));
    }
}

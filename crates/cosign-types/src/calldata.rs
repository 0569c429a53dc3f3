//! Call payloads understood by the account, token ledger and limit registry
//!
//! A payload is a 4-byte selector (`keccak256(signature)[..4]`) followed by
//! word-encoded arguments.

use crate::abi::{DecodeError, DecodeResult, WordReader, WordWriter};
use crate::Address;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::sync::OnceLock;

pub const TRANSFER: &str = "transfer(address,uint256)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const TRANSFER_FROM: &str = "transferFrom(address,address,uint256)";
pub const SET_SPENDING_LIMIT: &str = "setSpendingLimit(address,address,uint256)";
pub const REMOVE_SPENDING_LIMIT: &str = "removeSpendingLimit(address,address)";
pub const EXECUTE_BATCH: &str = "executeBatch((address,bytes)[])";

/// A 4-byte function selector
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Compute the selector of a canonical function signature
    pub fn of(signature: &str) -> Self {
        let hash = Keccak256::digest(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&hash[..4]);
        Self(bytes)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector(0x{})", hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Transfer,
    Approve,
    TransferFrom,
    SetSpendingLimit,
    RemoveSpendingLimit,
    ExecuteBatch,
}

fn selector_table() -> &'static [(Selector, CallKind); 6] {
    static TABLE: OnceLock<[(Selector, CallKind); 6]> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            (Selector::of(TRANSFER), CallKind::Transfer),
            (Selector::of(APPROVE), CallKind::Approve),
            (Selector::of(TRANSFER_FROM), CallKind::TransferFrom),
            (Selector::of(SET_SPENDING_LIMIT), CallKind::SetSpendingLimit),
            (Selector::of(REMOVE_SPENDING_LIMIT), CallKind::RemoveSpendingLimit),
            (Selector::of(EXECUTE_BATCH), CallKind::ExecuteBatch),
        ]
    })
}

fn selector_for(kind: CallKind) -> Selector {
    selector_table()
        .iter()
        .find(|(_, k)| *k == kind)
        .map(|(s, _)| *s)
        .unwrap_or(Selector([0; 4]))
}

/// One entry of a batch descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Call target
    pub target: Address,
    /// Payload dispatched to the target
    #[serde(with = "crate::hex_bytes")]
    pub payload: Vec<u8>,
}

impl BatchEntry {
    pub fn new(target: Address, payload: Vec<u8>) -> Self {
        Self { target, payload }
    }
}

/// A decoded call payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    /// Token transfer from the caller
    Transfer { to: Address, amount: u128 },
    /// Token allowance grant by the caller
    Approve { spender: Address, amount: u128 },
    /// Token pull by the caller acting as spender
    TransferFrom { from: Address, to: Address, amount: u128 },
    /// Registry: set a rolling limit
    SetSpendingLimit { account: Address, asset: Address, amount: u128 },
    /// Registry: lift a rolling limit
    RemoveSpendingLimit { account: Address, asset: Address },
    /// Account: ordered all-or-nothing batch
    ExecuteBatch(Vec<BatchEntry>),
}

impl Call {
    /// Encode the call as selector + arguments
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Transfer { to, amount } => WordWriter::with_prefix(&selector_for(CallKind::Transfer).0)
                .address(to)
                .uint(*amount)
                .finish(),
            Self::Approve { spender, amount } => {
                WordWriter::with_prefix(&selector_for(CallKind::Approve).0)
                    .address(spender)
                    .uint(*amount)
                    .finish()
            }
            Self::TransferFrom { from, to, amount } => {
                WordWriter::with_prefix(&selector_for(CallKind::TransferFrom).0)
                    .address(from)
                    .address(to)
                    .uint(*amount)
                    .finish()
            }
            Self::SetSpendingLimit {
                account,
                asset,
                amount,
            } => WordWriter::with_prefix(&selector_for(CallKind::SetSpendingLimit).0)
                .address(account)
                .address(asset)
                .uint(*amount)
                .finish(),
            Self::RemoveSpendingLimit { account, asset } => {
                WordWriter::with_prefix(&selector_for(CallKind::RemoveSpendingLimit).0)
                    .address(account)
                    .address(asset)
                    .finish()
            }
            Self::ExecuteBatch(entries) => {
                let mut writer = WordWriter::with_prefix(&selector_for(CallKind::ExecuteBatch).0);
                writer.uint(entries.len() as u128);
                for entry in entries {
                    writer.address(&entry.target).bytes(&entry.payload);
                }
                writer.finish()
            }
        }
    }

    /// Decode a payload.
    ///
    /// Returns `Ok(None)` for an empty payload or an unrecognised selector,
    /// and an error when a recognised selector carries malformed arguments.
    pub fn decode(data: &[u8]) -> DecodeResult<Option<Self>> {
        if data.len() < 4 {
            return Ok(None);
        }
        let (selector, args) = data.split_at(4);
        let kind = selector_table()
            .iter()
            .find(|(s, _)| s.0 == selector)
            .map(|(_, k)| *k);
        let Some(kind) = kind else {
            return Ok(None);
        };

        let mut reader = WordReader::new(args);
        let call = match kind {
            CallKind::Transfer => Self::Transfer {
                to: reader.address()?,
                amount: reader.uint()?,
            },
            CallKind::Approve => Self::Approve {
                spender: reader.address()?,
                amount: reader.uint()?,
            },
            CallKind::TransferFrom => Self::TransferFrom {
                from: reader.address()?,
                to: reader.address()?,
                amount: reader.uint()?,
            },
            CallKind::SetSpendingLimit => Self::SetSpendingLimit {
                account: reader.address()?,
                asset: reader.address()?,
                amount: reader.uint()?,
            },
            CallKind::RemoveSpendingLimit => Self::RemoveSpendingLimit {
                account: reader.address()?,
                asset: reader.address()?,
            },
            CallKind::ExecuteBatch => {
                let offset = 4;
                let count = usize::try_from(reader.uint()?)
                    .map_err(|_| DecodeError::Overflow { offset, bits: usize::BITS })?;
                // Each entry takes at least two words; bound the allocation by the input.
                if count > reader.remaining() / 64 {
                    return Err(DecodeError::UnexpectedEnd {
                        offset,
                        needed: count.saturating_mul(64),
                    });
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(BatchEntry {
                        target: reader.address()?,
                        payload: reader.bytes()?,
                    });
                }
                Self::ExecuteBatch(entries)
            }
        };
        reader.finish()?;
        Ok(Some(call))
    }

    /// Amount of `owner`'s own tokens this call moves out, if any.
    ///
    /// `transferFrom` counts when `owner` is the source, whoever the spender is.
    pub fn outflow_from(&self, owner: &Address) -> Option<u128> {
        match self {
            Self::Transfer { amount, .. } => Some(*amount),
            Self::TransferFrom { from, amount, .. } if from == owner => Some(*amount),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(Selector::of(TRANSFER).0, [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(Selector::of(APPROVE).0, [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(Selector::of(TRANSFER_FROM).0, [0x23, 0xb8, 0x72, 0xdd]);
    }

    #[test]
    fn test_transfer_layout() {
        let to = Address([0x22; 20]);
        let data = Call::Transfer { to, amount: 10 }.encode();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(
            Call::decode(&data).unwrap(),
            Some(Call::Transfer { to, amount: 10 })
        );
    }

    #[test]
    fn test_batch_decodes_in_order() {
        let token = Address([0x33; 20]);
        let batch = Call::ExecuteBatch(vec![
            BatchEntry::new(token, Call::Transfer { to: Address([1; 20]), amount: 1 }.encode()),
            BatchEntry::new(token, Call::Transfer { to: Address([2; 20]), amount: 2 }.encode()),
            BatchEntry::new(Address([4; 20]), vec![]),
        ]);
        let decoded = Call::decode(&batch.encode()).unwrap().unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_unknown_selector_and_empty_payload() {
        assert_eq!(Call::decode(&[]).unwrap(), None);
        assert_eq!(Call::decode(&[0xde, 0xad, 0xbe, 0xef]).unwrap(), None);
    }

    #[test]
    fn test_known_selector_with_bad_args() {
        let mut data = Call::Approve {
            spender: Address([5; 20]),
            amount: 1,
        }
        .encode();
        data.truncate(40);
        assert!(Call::decode(&data).is_err());
    }

    #[test]
    fn test_batch_count_bounded_by_input() {
        let mut data = Selector::of(EXECUTE_BATCH).0.to_vec();
        data.extend(WordWriter::new().uint(1_000_000).finish());
        assert!(matches!(
            Call::decode(&data),
            Err(DecodeError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_outflow_from_owner() {
        let me = Address([0xac; 20]);
        let bob = Address([0xb0; 20]);
        assert_eq!(Call::Transfer { to: bob, amount: 4 }.outflow_from(&me), Some(4));
        assert_eq!(
            Call::TransferFrom { from: me, to: bob, amount: 9 }.outflow_from(&me),
            Some(9)
        );
        assert_eq!(
            Call::TransferFrom { from: bob, to: me, amount: 9 }.outflow_from(&me),
            None
        );
        assert_eq!(Call::Approve { spender: bob, amount: 1 }.outflow_from(&me), None);
    }
}

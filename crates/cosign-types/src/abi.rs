//! Word-oriented wire codec
//!
//! Every value occupies one or more 32-byte big-endian words. Addresses are
//! left-padded, integers are u256 words whose high half must be zero, and byte
//! strings are a length word followed by the bytes right-padded to a word
//! boundary.

use crate::Address;
use thiserror::Error;

/// Width of one encoded word
pub const WORD: usize = 32;

/// Errors decoding wire data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset}: needed {needed} more bytes")]
    UnexpectedEnd { offset: usize, needed: usize },

    #[error("value at offset {offset} does not fit in {bits} bits")]
    Overflow { offset: usize, bits: u32 },

    #[error("address word at offset {offset} has non-zero padding")]
    DirtyAddress { offset: usize },

    #[error("invalid discriminant {value} for {field}")]
    InvalidDiscriminant { field: &'static str, value: u128 },

    #[error("{remaining} trailing bytes after decoding")]
    TrailingBytes { remaining: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Appends 32-byte words to a buffer
#[derive(Debug, Default, Clone)]
pub struct WordWriter {
    buf: Vec<u8>,
}

impl WordWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer whose output starts with raw prefix bytes (e.g. a selector)
    pub fn with_prefix(prefix: &[u8]) -> Self {
        Self {
            buf: prefix.to_vec(),
        }
    }

    /// Append an address word
    pub fn address(&mut self, address: &Address) -> &mut Self {
        self.buf.extend_from_slice(&[0u8; WORD - Address::LEN]);
        self.buf.extend_from_slice(address.as_bytes());
        self
    }

    /// Append an unsigned integer word
    pub fn uint(&mut self, value: u128) -> &mut Self {
        self.buf.extend_from_slice(&[0u8; 16]);
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a length-prefixed byte string padded to a word boundary
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.uint(bytes.len() as u128);
        self.buf.extend_from_slice(bytes);
        let padding = (WORD - bytes.len() % WORD) % WORD;
        self.buf.extend(std::iter::repeat(0u8).take(padding));
        self
    }

    /// Consume the writer and return the encoded bytes
    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// Reads 32-byte words from a buffer
#[derive(Debug, Clone)]
pub struct WordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WordReader<'a> {
    /// Start reading at the beginning of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(DecodeError::UnexpectedEnd {
                offset: self.pos,
                needed: len - (self.buf.len() - self.pos.min(self.buf.len())),
            }),
        }
    }

    /// Read an address word
    pub fn address(&mut self) -> DecodeResult<Address> {
        let offset = self.pos;
        let word = self.take(WORD)?;
        let (padding, body) = word.split_at(WORD - Address::LEN);
        if padding.iter().any(|b| *b != 0) {
            return Err(DecodeError::DirtyAddress { offset });
        }
        let mut bytes = [0u8; Address::LEN];
        bytes.copy_from_slice(body);
        Ok(Address(bytes))
    }

    /// Read an unsigned integer word (must fit in u128)
    pub fn uint(&mut self) -> DecodeResult<u128> {
        let offset = self.pos;
        let word = self.take(WORD)?;
        let (high, low) = word.split_at(16);
        if high.iter().any(|b| *b != 0) {
            return Err(DecodeError::Overflow { offset, bits: 128 });
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(low);
        Ok(u128::from_be_bytes(bytes))
    }

    /// Read an unsigned integer word that must fit in u64
    pub fn uint64(&mut self) -> DecodeResult<u64> {
        let offset = self.pos;
        let value = self.uint()?;
        u64::try_from(value).map_err(|_| DecodeError::Overflow { offset, bits: 64 })
    }

    /// Read a length-prefixed, padded byte string
    pub fn bytes(&mut self) -> DecodeResult<Vec<u8>> {
        let offset = self.pos;
        let len = usize::try_from(self.uint()?)
            .map_err(|_| DecodeError::Overflow { offset, bits: usize::BITS })?;
        let body = self.take(len)?.to_vec();
        let padding = (WORD - len % WORD) % WORD;
        self.take(padding)?;
        Ok(body)
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Require that the whole input was consumed
    pub fn finish(self) -> DecodeResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::TrailingBytes { remaining }),
        }
    }
}

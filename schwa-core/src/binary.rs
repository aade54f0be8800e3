//! Low-level binary codec for the output module format.
//!
//! [`Writer`] accumulates bytes for the emitted module: fixed-width
//! little-endian integers, unsigned/signed LEB128 variable-length
//! integers at any width up to 64 bits, and length-prefixed UTF-8
//! strings. [`Reader`] is the mirror-image cursor over a finished byte
//! sequence.
//!
//! Width handling is part of the contract: unsigned values are reduced
//! modulo `2^bits` and signed values are clamped into
//! `[-2^(bits-1), 2^(bits-1)-1]` before encoding. Callers that need
//! overflow detection must range-check before writing.
//!
//! Every [`Reader`] operation is bounds-checked; a truncated or
//! malformed stream surfaces as a [`CodecError`], never as an
//! out-of-range read.

use thiserror::Error;

/// Decode failure raised by [`Reader`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of stream at offset {offset}: {needed} more byte(s) required")]
    UnexpectedEnd { offset: usize, needed: usize },
    #[error("variable-length integer exceeds {bits} bits")]
    VarintOverflow { bits: u32 },
    #[error("length-prefixed string is not valid UTF-8")]
    InvalidUtf8,
}

/// Types that know how to serialize themselves through a [`Writer`].
///
/// Higher-level module structures (sections, types, instructions)
/// implement this so they can compose into a module byte sequence
/// without the codec knowing their shapes.
pub trait Encode {
    fn encode(&self, writer: &mut Writer);
}

/// Append-only byte accumulator. The write position is always the end
/// of the buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub fn new() -> Writer {
        Writer::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Unsigned LEB128 at the given bit width.
    ///
    /// The value is reduced modulo `2^bits` first, so an out-of-range
    /// value wraps rather than erroring.
    pub fn write_uvar(&mut self, value: u64, bits: u32) {
        let mut value = reduce_unsigned(value, bits);
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                self.bytes.push(byte | 0x80);
            } else {
                self.bytes.push(byte);
                break;
            }
        }
    }

    /// Signed LEB128 at the given bit width.
    ///
    /// The value is clamped into `[-2^(bits-1), 2^(bits-1)-1]` first,
    /// so an out-of-range value saturates rather than erroring.
    pub fn write_svar(&mut self, value: i64, bits: u32) {
        let mut value = clamp_signed(value, bits);
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            let sign_bit = byte & 0x40 != 0;
            let done = (value == 0 && !sign_bit) || (value == -1 && sign_bit);
            if done {
                self.bytes.push(byte);
                break;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    /// Length-prefixed UTF-8 string. The prefix is the byte length (not
    /// the code-point count) as a 32-bit unsigned varint.
    pub fn write_str(&mut self, value: &str) {
        self.write_uvar(value.len() as u64, 32);
        self.bytes.extend_from_slice(value.as_bytes());
    }

    /// Raw byte append, no framing.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Lets any [`Encode`] value serialize itself into this writer.
    pub fn write(&mut self, value: &impl Encode) {
        value.encode(self);
    }
}

fn reduce_unsigned(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

fn clamp_signed(value: i64, bits: u32) -> i64 {
    if bits >= 64 {
        value
    } else {
        let max = (1i64 << (bits - 1)) - 1;
        let min = -(1i64 << (bits - 1));
        value.clamp(min, max)
    }
}

/// Maximum encoded length of a varint at the given width.
fn max_varint_bytes(bits: u32) -> usize {
    (bits as usize).div_ceil(7)
}

/// Cursor over a fixed byte sequence, advanced by each decode.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, cursor: 0 }
    }

    /// Current cursor position in bytes from the start.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor == self.bytes.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < count {
            return Err(CodecError::UnexpectedEnd {
                offset: self.cursor,
                needed: count - self.remaining(),
            });
        }
        let slice = &self.bytes[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Unsigned LEB128 at the given bit width.
    pub fn read_uvar(&mut self, bits: u32) -> Result<u64, CodecError> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        for _ in 0..max_varint_bytes(bits) {
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(CodecError::VarintOverflow { bits })
    }

    /// Signed LEB128 at the given bit width, sign-extended to i64.
    pub fn read_svar(&mut self, bits: u32) -> Result<i64, CodecError> {
        let mut result: i64 = 0;
        let mut shift = 0u32;
        for _ in 0..max_varint_bytes(bits) {
            let byte = self.read_u8()?;
            result |= i64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
        Err(CodecError::VarintOverflow { bits })
    }

    /// Length-prefixed UTF-8 string written by [`Writer::write_str`].
    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let length = self.read_uvar(32)? as usize;
        let bytes = self.take(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        self.take(count)
    }
}

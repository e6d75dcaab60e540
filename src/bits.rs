//! Bit-level buffers
//!
//! `BitWriter` appends fields most-significant-bit first into a growing byte
//! vector; `BitReader` consumes them in the same order. Every multi-bit field
//! of every message format goes through these two types.

use crate::error::{DecodeError, Result};

/// Append-only MSB-first bit writer
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with room for `bits` bits
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            bit_len: 0,
        }
    }

    /// Append the low `width` bits of `value`, most significant first
    pub fn write_bits(&mut self, value: u64, width: u32) {
        debug_assert!(width <= 64);
        for i in (0..width).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    /// Append `value` as a `width`-bit two's complement field
    pub fn write_signed(&mut self, value: i64, width: u32) {
        self.write_bits(value as u64, width);
    }

    /// Append a single bit
    pub fn write_bool(&mut self, bit: bool) {
        self.push_bit(bit);
    }

    fn push_bit(&mut self, bit: bool) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.bytes.push(0);
        }
        if bit {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 0x80 >> offset;
            }
        }
        self.bit_len += 1;
    }

    /// Bits written so far
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Bytes needed to hold the bits written so far
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Finish writing; the last partial byte is zero-filled
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Sequential MSB-first bit reader over a byte slice
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    /// Start reading at the first bit of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Total bits in the underlying buffer
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Bits consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bits left in the buffer
    pub fn remaining(&self) -> usize {
        self.bit_len() - self.position
    }

    /// Read an unsigned `width`-bit field
    pub fn read_bits(&mut self, width: u32) -> Result<u64> {
        debug_assert!(width <= 64);
        let needed = self.position + width as usize;
        if needed > self.bit_len() {
            return Err(DecodeError::BufferTooShort {
                needed,
                available: self.bit_len(),
            }
            .into());
        }

        let mut value = 0u64;
        for _ in 0..width {
            let byte = self.bytes[self.position / 8];
            let bit = (byte >> (7 - self.position % 8)) & 1;
            value = (value << 1) | bit as u64;
            self.position += 1;
        }
        Ok(value)
    }

    /// Read a `width`-bit two's complement field, sign-extended
    pub fn read_signed(&mut self, width: u32) -> Result<i64> {
        let raw = self.read_bits(width)?;
        if width == 0 {
            return Ok(0);
        }
        let shift = 64 - width;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Read a single bit
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdasenseError;

    #[test]
    fn test_msb_first_layout() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b11, 2);
        assert_eq!(writer.bit_len(), 5);
        assert_eq!(writer.into_bytes(), vec![0b1011_1000]);
    }

    #[test]
    fn test_cross_byte_fields() {
        let mut writer = BitWriter::new();
        writer.write_bits(0x3, 2);
        writer.write_bits(0x1FF, 9);
        writer.write_bits(0xABCD, 16);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 4);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(2).unwrap(), 0x3);
        assert_eq!(reader.read_bits(9).unwrap(), 0x1FF);
        assert_eq!(reader.read_bits(16).unwrap(), 0xABCD);
        assert_eq!(reader.position(), 27);
        assert_eq!(reader.remaining(), 5);
    }

    #[test]
    fn test_signed_sign_extension() {
        let mut writer = BitWriter::new();
        writer.write_signed(-3, 5);
        writer.write_signed(7, 5);
        writer.write_signed(-16, 5);
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_signed(5).unwrap(), -3);
        assert_eq!(reader.read_signed(5).unwrap(), 7);
        assert_eq!(reader.read_signed(5).unwrap(), -16);
    }

    #[test]
    fn test_zero_padding_reads_as_zero() {
        let mut writer = BitWriter::new();
        writer.write_bits(1, 1);
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&[0, 0]);

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_bits(20).unwrap(), 0);
    }

    #[test]
    fn test_read_past_end() {
        let bytes = [0xFFu8];
        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bits(6).is_ok());
        let err = reader.read_bits(3).unwrap_err();
        assert!(matches!(
            err,
            AdasenseError::Decode(DecodeError::BufferTooShort {
                needed: 9,
                available: 8
            })
        ));
    }

    #[test]
    fn test_full_width_field() {
        let mut writer = BitWriter::with_capacity(64);
        writer.write_bits(u64::MAX - 1, 64);
        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(64).unwrap(), u64::MAX - 1);
    }
}

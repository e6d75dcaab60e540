//! Protocol definitions for AdaSense
//!
//! This module defines the core types shared by the policies and the codec:
//! - Wire constants (widths, shift range, length prefix)
//! - Encoding and encryption modes
//! - The `Measurements` matrix
//! - Collected-index validation and bitmap packing

use crate::bits::{BitReader, BitWriter};
use crate::error::{ConfigError, Result, ShapeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bits in a byte
pub const BITS_PER_BYTE: u32 = 8;

/// Default global bit width for standard messages
pub const BIT_WIDTH: u32 = 16;

/// Smallest width the group planner assigns
pub const MIN_WIDTH: u32 = 5;

/// Largest width the group planner assigns
pub const MAX_WIDTH: u32 = 16;

/// Bits used for a group width on the wire (stored as `width - 1`)
pub const WIDTH_BITS: u32 = 5;

/// Largest width a group table entry can carry. The all-ones width code
/// terminates the table.
pub const MAX_GROUP_WIDTH: u32 = (1 << WIDTH_BITS) - 1;

/// Bits used for a group shift on the wire (two's complement)
pub const SHIFT_BITS: u32 = 3;

/// Smallest group shift
pub const MIN_SHIFT: i32 = -(1 << (SHIFT_BITS - 1));

/// Largest group shift
pub const MAX_SHIFT: i32 = (1 << (SHIFT_BITS - 1)) - 1;

/// Largest supported fractional precision
pub const MAX_PRECISION: u32 = 31;

/// Length prefix added by the transport in front of every message
pub const LENGTH_SIZE: usize = 2;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// ChaCha20 nonce length in bytes
pub const CHACHA_NONCE_LEN: usize = 12;

/// Margin added to the target of the non-adaptive policies
pub const MARGIN: f64 = 0.005;

/// Seed used for policy generators when none is configured
pub const DEFAULT_SEED: u64 = 78362;

/// How collected measurements are serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncodingMode {
    /// Single global width, bitmap of collected indices
    #[default]
    Standard,
    /// Per-group widths sized to a byte budget
    Group,
}

impl EncodingMode {
    /// Upper-case name, as reported in policy summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingMode::Standard => "STANDARD",
            EncodingMode::Group => "GROUP",
        }
    }
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(EncodingMode::Standard),
            "group" => Ok(EncodingMode::Group),
            _ => Err(ConfigError::UnknownEncoding(s.to_string())),
        }
    }
}

/// Encryption applied by the transport after encoding.
///
/// Only affects byte-budget arithmetic; the codec itself is unaware of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionMode {
    /// Stream cipher: length preserving, prepends a nonce
    #[default]
    Stream,
    /// Block cipher: pads to a multiple of the block size
    Block,
}

impl EncryptionMode {
    /// Cipher block size in bytes (1 for stream ciphers)
    pub fn block_size(&self) -> usize {
        match self {
            EncryptionMode::Stream => 1,
            EncryptionMode::Block => AES_BLOCK_SIZE,
        }
    }

    /// Nonce bytes sent alongside the ciphertext
    pub fn nonce_len(&self) -> usize {
        match self {
            EncryptionMode::Stream => CHACHA_NONCE_LEN,
            EncryptionMode::Block => 0,
        }
    }

    /// Upper-case name, as reported in policy summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionMode::Stream => "STREAM",
            EncryptionMode::Block => "BLOCK",
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stream" => Ok(EncryptionMode::Stream),
            "block" => Ok(EncryptionMode::Block),
            _ => Err(ConfigError::UnknownEncryption(s.to_string())),
        }
    }
}

/// Row-major matrix of measurements: one row per time step, one column per
/// feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measurements {
    num_features: usize,
    values: Vec<f64>,
}

impl Measurements {
    /// Build from flat row-major values
    pub fn new(num_features: usize, values: Vec<f64>) -> Result<Self> {
        if num_features == 0 || values.len() % num_features != 0 {
            return Err(ShapeError::RaggedData {
                len: values.len(),
                num_features,
            }
            .into());
        }
        Ok(Self {
            num_features,
            values,
        })
    }

    /// Build from values already known to be a whole number of rows
    pub(crate) fn from_raw(num_features: usize, values: Vec<f64>) -> Self {
        debug_assert!(num_features == 0 || values.len() % num_features == 0);
        Self {
            num_features,
            values,
        }
    }

    /// Empty matrix with a fixed feature count
    pub fn empty(num_features: usize) -> Self {
        Self {
            num_features,
            values: Vec::new(),
        }
    }

    /// Build from rows; every row must have the same length
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let num_features = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if num_features == 0 {
            return Err(ShapeError::RaggedData {
                len: 0,
                num_features: 0,
            }
            .into());
        }

        let mut matrix = Self::empty(num_features);
        for row in rows {
            matrix.push_row(row.as_ref())?;
        }
        Ok(matrix)
    }

    /// Append one measurement
    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.num_features {
            return Err(ShapeError::FeatureMismatch {
                expected: self.num_features,
                actual: row.len(),
            }
            .into());
        }
        self.values.extend_from_slice(row);
        Ok(())
    }

    /// Number of measurements (rows)
    pub fn len(&self) -> usize {
        self.values.len() / self.num_features.max(1)
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Features per measurement
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Row `idx`
    pub fn row(&self, idx: usize) -> &[f64] {
        let start = idx * self.num_features;
        &self.values[start..start + self.num_features]
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.num_features.max(1))
    }

    /// Flat row-major values
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Consume into flat row-major values
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Keep only the first `rows` measurements
    pub fn truncate(&mut self, rows: usize) {
        self.values.truncate(rows * self.num_features);
    }

    /// Copy of the rows selected by `indices`
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut values = Vec::with_capacity(indices.len() * self.num_features);
        for &idx in indices {
            values.extend_from_slice(self.row(idx));
        }
        Self {
            num_features: self.num_features,
            values,
        }
    }
}

/// Number of measurements a target fraction asks for: `ceil(target * T)`,
/// capped at `T`.
pub fn target_count(target: f64, seq_length: usize) -> usize {
    // Tolerance so that e.g. 0.3 * 10 does not round up to 4
    let exact = target * seq_length as f64;
    let count = (exact - 1e-9).ceil().max(0.0) as usize;
    count.min(seq_length)
}

/// Check that collected indices match the measurements and the sequence.
pub fn validate_indices(
    measurements: &Measurements,
    collected_indices: &[usize],
    seq_length: usize,
) -> Result<()> {
    if measurements.len() != collected_indices.len() {
        return Err(ShapeError::IndexCountMismatch {
            measurements: measurements.len(),
            indices: collected_indices.len(),
        }
        .into());
    }

    for (position, &index) in collected_indices.iter().enumerate() {
        if index >= seq_length {
            return Err(ShapeError::IndexOutOfRange { index, seq_length }.into());
        }
        if position > 0 && collected_indices[position - 1] >= index {
            return Err(ShapeError::UnsortedIndices { position }.into());
        }
    }

    Ok(())
}

/// Append a `seq_length`-bit bitmap with a one at every collected index.
pub fn write_bitmap(writer: &mut BitWriter, collected_indices: &[usize], seq_length: usize) {
    let mut next = collected_indices.iter().peekable();
    for idx in 0..seq_length {
        let collected = next.peek().map(|&&i| i == idx).unwrap_or(false);
        if collected {
            next.next();
        }
        writer.write_bool(collected);
    }
}

/// Read a `seq_length`-bit bitmap back into collected indices.
pub fn read_bitmap(reader: &mut BitReader<'_>, seq_length: usize) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for idx in 0..seq_length {
        if reader.read_bool()? {
            indices.push(idx);
        }
    }
    Ok(indices)
}

/// Bytes used by a `seq_length`-bit bitmap
pub fn bitmap_bytes(seq_length: usize) -> usize {
    seq_length.div_ceil(BITS_PER_BYTE as usize)
}

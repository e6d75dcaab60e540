//! Error types for AdaSense
//!
//! This module defines all error types used throughout the library.
//! Numeric overflow (quantization, group widths) is never an error: it is
//! clamped where it happens. Missing thresholds are warnings, not errors.

use thiserror::Error;

/// Result type alias for AdaSense operations
pub type Result<T> = std::result::Result<T, AdasenseError>;

/// Main error type for AdaSense operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdasenseError {
    /// Configuration error (fails at construction time)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// Decoding error
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// Shape or precondition violation
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),
}

/// Errors in policy or codec configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Policy name is not known
    #[error("Unknown policy with name: {0}")]
    UnknownPolicy(String),

    /// Encoding mode name is not known
    #[error("Unknown encoding type: {0}")]
    UnknownEncoding(String),

    /// Encryption mode name is not known
    #[error("Unknown encryption mode: {0}")]
    UnknownEncryption(String),

    /// Target fraction outside (0, 1 + margin]
    #[error("Invalid target fraction: {0}")]
    InvalidTarget(f64),

    /// Width outside the supported range
    #[error("Invalid bit width {width}: must be in [{min}, {max}]")]
    InvalidWidth { width: u32, min: u32, max: u32 },

    /// Precision outside the supported range
    #[error("Invalid precision {precision}: must be at most {max}")]
    InvalidPrecision { precision: u32, max: u32 },

    /// Sequence length or feature count is zero
    #[error("Invalid dimensions: {num_features} features, sequence length {seq_length}")]
    InvalidDimensions {
        num_features: usize,
        seq_length: usize,
    },

    /// Threshold table could not be read or parsed
    #[error("Threshold file {path}: {reason}")]
    ThresholdFile { path: String, reason: String },

    /// Threshold table JSON is malformed
    #[error("Invalid threshold table: {0}")]
    ThresholdFormat(String),

    /// Quantization settings could not be read or parsed
    #[error("Quantize file {path}: {reason}")]
    QuantizeFile { path: String, reason: String },

    /// Compression requested but the `compression` feature is disabled
    #[error("Compression requested but no compressor is available")]
    CompressionUnavailable,
}

/// Errors during encoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// The byte compressor failed
    #[error("Compression failed: {0}")]
    Compression(String),
}

/// Errors during decoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Buffer ended before a required field
    #[error("Buffer too short: need at least {needed} bits, got {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Malformed message
    #[error("Malformed message at bit {offset}: {reason}")]
    MalformedMessage { offset: usize, reason: String },

    /// The byte decompressor failed
    #[error("Decompression failed: {0}")]
    Decompression(String),
}

/// Shape and precondition violations (programmer errors)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// Row width does not match the configured feature count
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    /// Flat data length is not a multiple of the feature count
    #[error("Data length {len} is not a multiple of {num_features} features")]
    RaggedData { len: usize, num_features: usize },

    /// Number of indices differs from number of measurements
    #[error("Got {measurements} measurements but {indices} collected indices")]
    IndexCountMismatch { measurements: usize, indices: usize },

    /// Index past the end of the sequence
    #[error("Collected index {index} outside sequence of length {seq_length}")]
    IndexOutOfRange { index: usize, seq_length: usize },

    /// Indices not strictly increasing
    #[error("Collected indices must be strictly increasing (at position {position})")]
    UnsortedIndices { position: usize },

    /// Group plan does not match the values being encoded
    #[error("Group plan covers {planned} values but {values} were collected")]
    PlanMismatch { planned: usize, values: usize },
}

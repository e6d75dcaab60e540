//! Byte compression for standard messages
//!
//! Compression is an opaque, lossless pass over the packed message bytes.
//! The zstd backend is only available with the `compression` feature.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
#[cfg(not(feature = "compression"))]
use crate::error::ConfigError;
#[cfg(feature = "compression")]
use crate::error::{DecodeError, EncodeError};

/// Default zstd level
pub const DEFAULT_LEVEL: i32 = 3;

/// Lossless byte compressor
pub trait Compressor: Send + Sync + Debug {
    /// Compress packed message bytes
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Inverse of [`Compressor::compress`]
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// zstd-backed compressor
#[cfg(feature = "compression")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdCompressor {
    level: i32,
}

#[cfg(feature = "compression")]
impl ZstdCompressor {
    /// Create a compressor at the given zstd level
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Compression level
    pub fn level(&self) -> i32 {
        self.level
    }
}

#[cfg(feature = "compression")]
impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

#[cfg(feature = "compression")]
impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level)
            .map_err(|e| EncodeError::Compression(e.to_string()).into())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| DecodeError::Decompression(e.to_string()).into())
    }
}

/// Compressor used when a policy is configured with `should_compress`
#[cfg(feature = "compression")]
pub fn default_compressor() -> Result<Arc<dyn Compressor>> {
    Ok(Arc::new(ZstdCompressor::default()))
}

/// Compressor used when a policy is configured with `should_compress`
#[cfg(not(feature = "compression"))]
pub fn default_compressor() -> Result<Arc<dyn Compressor>> {
    Err(ConfigError::CompressionUnavailable.into())
}

#[cfg(all(test, feature = "compression"))]
mod tests {
    use super::*;
    use crate::encoder::encode_standard;
    use crate::protocol::Measurements;

    #[test]
    fn test_zstd_roundtrip() {
        let compressor = ZstdCompressor::default();
        let data: Vec<u8> = (0..512).map(|i| (i % 7) as u8).collect();

        let compressed = compressor.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(compressor.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_compressed_message_roundtrip() {
        let rows: Vec<[f64; 4]> = (0..40).map(|_| [0.5, 0.5, -0.25, 1.0]).collect();
        let m = Measurements::from_rows(&rows).unwrap();
        let indices: Vec<usize> = (0..40).collect();
        let packed = encode_standard(&m, &indices, 40, 16, 8).unwrap();

        let compressor = default_compressor().unwrap();
        let compressed = compressor.compress(&packed).unwrap();
        assert!(compressed.len() < packed.len());
        assert_eq!(compressor.decompress(&compressed).unwrap(), packed);
    }

    #[test]
    fn test_decompress_garbage() {
        let compressor = ZstdCompressor::new(1);
        assert!(compressor.decompress(&[1, 2, 3, 4, 5]).is_err());
    }
}

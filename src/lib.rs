//! # AdaSense - Adaptive sampling and budgeted telemetry codec
//!
//! A sampling and encoding library for energy-constrained sensors that must
//! decide, step by step, which measurements are worth sending, and then fit
//! what they kept into a fixed byte budget.
//!
//! ## Key Features
//!
//! - **Adaptive Sampling**: Skip measurements while the signal is quiet
//! - **Budgeted Encoding**: Group widths planned to fit a message size
//! - **Encryption Aware**: Budgets account for stream or block ciphers
//! - **Self-Describing**: The receiver only needs the sequence shape
//!
//! ## Quick Start
//!
//! ```rust
//! use adasense::{make_policy, run_policy, EncodingMode, Measurements, PolicyConfig, ThresholdTable};
//!
//! // 20 steps of 2 features
//! let rows: Vec<[f64; 2]> = (0..20).map(|t| [t as f64 * 0.25, 1.0]).collect();
//! let sequence = Measurements::from_rows(&rows).unwrap();
//!
//! let config = PolicyConfig::new(0.3, 2, 20)
//!     .with_precision(8)
//!     .with_encoding(EncodingMode::Group);
//! let mut thresholds = ThresholdTable::new();
//! thresholds.insert("adaptive_heuristic", 0.3, 1.0);
//! let mut policy = make_policy("adaptive_heuristic", &config, &thresholds).unwrap();
//!
//! // Collect and encode
//! let (collected, indices) = run_policy(&mut policy, &sequence).unwrap();
//! let message = policy.encode(&collected, &indices).unwrap();
//!
//! // Decode on the receiver
//! let (decoded, decoded_indices) = policy.decode(&message).unwrap();
//! assert_eq!(decoded_indices, indices);
//! assert_eq!(decoded.len(), collected.len());
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Wire constants, modes and the measurement matrix
//! - [`quantize`]: Fixed-point conversion
//! - [`bits`]: Bit-level reader and writer
//! - [`planner`]: Byte budgets, group widths and pruning
//! - [`encoder`] / [`decoder`]: Standard, grouped and stable formats
//! - [`policy`]: Sampling policies
//! - [`driver`]: Running policies over sequences
//! - [`metrics`]: Collection and message size statistics

// Modules
pub mod bits;
pub mod compression;
pub mod config;
pub mod decoder;
pub mod delta;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod planner;
pub mod policy;
pub mod protocol;
pub mod quantize;
pub mod reconstruct;

// Re-exports for convenient access
pub use compression::{default_compressor, Compressor};
#[cfg(feature = "compression")]
pub use compression::ZstdCompressor;
pub use config::{PolicyConfig, QuantizeConfig, ThresholdTable};
pub use decoder::{decode_grouped, decode_stable, decode_standard};
pub use delta::{delta_decode, delta_encode};
pub use driver::{run_policy, run_sequences, SequenceOutcome};
pub use encoder::{encode_grouped, encode_grouped_plan, encode_stable, encode_standard};
pub use error::{AdasenseError, ConfigError, DecodeError, EncodeError, Result, ShapeError};
pub use metrics::SamplingMetrics;
pub use planner::{GroupPlan, GroupSpec};
pub use policy::{make_policy, Policy, PolicySummary};
pub use protocol::{EncodingMode, EncryptionMode, Measurements};
pub use reconstruct::{mean_absolute_error, reconstruct_sequence};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_roundtrip() {
        let config = PolicyConfig::new(0.5, 1, 8).with_precision(6).with_width(8);
        let policy = make_policy("uniform", &config, &ThresholdTable::new()).unwrap();

        let m = Measurements::from_rows(&[[0.75], [-0.5]]).unwrap();
        let message = policy.encode(&m, &[0, 3]).unwrap();
        let (decoded, indices) = policy.decode(&message).unwrap();

        assert_eq!(decoded, m);
        assert_eq!(indices, vec![0, 3]);
    }
}

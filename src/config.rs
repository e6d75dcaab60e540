// AdaSense - Adaptive sampling and budgeted telemetry codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for AdaSense policies
//!
//! - [`PolicyConfig`]: everything a policy needs at construction time
//! - [`QuantizeConfig`]: per-dataset fixed-point precision (`quantize.json`)
//! - [`ThresholdTable`]: precomputed adaptive thresholds keyed by policy
//!   name and target fraction

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoder::MAX_STABLE_WIDTH;
use crate::error::{AdasenseError, ConfigError, Result};
use crate::protocol::{
    EncodingMode, EncryptionMode, BIT_WIDTH, DEFAULT_SEED, MARGIN, MAX_PRECISION,
};

/// Targets closer than this share a threshold entry
const TARGET_TOLERANCE: f64 = 1e-6;

/// Policy-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Fraction of the sequence to collect, in (0, 1]
    pub target: f64,

    /// Fractional bits of the fixed-point format
    pub precision: u32,

    /// Global bit width (standard encoding; grouped uses it for the
    /// integer bit count `width - precision`)
    pub width: u32,

    /// Features per measurement
    pub num_features: usize,

    /// Measurements per sequence
    pub seq_length: usize,

    /// Encryption applied to messages after encoding
    pub encryption_mode: EncryptionMode,

    /// Codec used by adaptive policies
    pub encoding_mode: EncodingMode,

    /// Compress standard messages
    pub should_compress: bool,

    /// Seed for the policy's random number generator
    pub seed: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            target: 0.5,
            precision: 8,
            width: BIT_WIDTH,
            num_features: 1,
            seq_length: 50,
            encryption_mode: EncryptionMode::Stream,
            encoding_mode: EncodingMode::Standard,
            should_compress: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl PolicyConfig {
    /// Create a configuration for sequences of `seq_length` measurements with
    /// `num_features` features each
    pub fn new(target: f64, num_features: usize, seq_length: usize) -> Self {
        Self {
            target,
            num_features,
            seq_length,
            ..Default::default()
        }
    }

    /// Set the target fraction
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = target;
        self
    }

    /// Set the fractional precision
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Set the global bit width
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Set the encryption mode
    pub fn with_encryption(mut self, mode: EncryptionMode) -> Self {
        self.encryption_mode = mode;
        self
    }

    /// Set the encoding mode
    pub fn with_encoding(mut self, mode: EncodingMode) -> Self {
        self.encoding_mode = mode;
        self
    }

    /// Enable or disable compression of standard messages
    pub fn with_compression(mut self, should_compress: bool) -> Self {
        self.should_compress = should_compress;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Apply the precision from a dataset's quantization settings
    pub fn with_quantize(mut self, quantize: &QuantizeConfig) -> Self {
        self.precision = quantize.precision;
        self
    }

    /// Check every field; called by policy constructors
    pub fn validate(&self) -> Result<()> {
        if !(self.target.is_finite() && self.target > 0.0 && self.target <= 1.0 + MARGIN) {
            return Err(ConfigError::InvalidTarget(self.target).into());
        }
        if self.width == 0 || self.width > MAX_STABLE_WIDTH {
            return Err(ConfigError::InvalidWidth {
                width: self.width,
                min: 1,
                max: MAX_STABLE_WIDTH,
            }
            .into());
        }
        if self.precision > MAX_PRECISION {
            return Err(ConfigError::InvalidPrecision {
                precision: self.precision,
                max: MAX_PRECISION,
            }
            .into());
        }
        if self.num_features == 0 || self.seq_length == 0 {
            return Err(ConfigError::InvalidDimensions {
                num_features: self.num_features,
                seq_length: self.seq_length,
            }
            .into());
        }
        Ok(())
    }
}

/// Dataset quantization settings, read from `quantize.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizeConfig {
    /// Fractional bits
    pub precision: u32,
}

impl QuantizeConfig {
    /// Load from a JSON file of the form `{"precision": 10}`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_error = |reason: String| ConfigError::QuantizeFile {
            path: path.display().to_string(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| file_error(e.to_string()))?;

        if config.precision > MAX_PRECISION {
            return Err(ConfigError::InvalidPrecision {
                precision: config.precision,
                max: MAX_PRECISION,
            }
            .into());
        }
        Ok(config)
    }
}

/// Precomputed thresholds for adaptive policies.
///
/// Serialized as `{"adaptive_heuristic": {"0.3": 0.12, "0.5": 0.04}}`.
/// Lookups that miss return 0.0 with a warning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    entries: BTreeMap<String, Vec<(f64, f64)>>,
}

impl ThresholdTable {
    /// Empty table; every lookup falls back to 0.0
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, f64>> = serde_json::from_str(text)
            .map_err(|e| ConfigError::ThresholdFormat(e.to_string()))?;

        let mut table = Self::new();
        for (name, targets) in raw {
            for (key, threshold) in targets {
                let target: f64 = key.trim().parse().map_err(|_| {
                    ConfigError::ThresholdFormat(format!(
                        "target key {:?} of {} is not a number",
                        key, name
                    ))
                })?;
                table.insert(&name, target, threshold);
            }
        }
        Ok(table)
    }

    /// Load a table from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_error = |reason: String| ConfigError::ThresholdFile {
            path: path.display().to_string(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        Self::from_json(&text).map_err(|e| match e {
            AdasenseError::Config(ConfigError::ThresholdFormat(reason)) => {
                file_error(reason).into()
            }
            other => other,
        })
    }

    /// Load a table, or fall back to an empty one when the file is missing
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "No threshold file at {}. Thresholds default to 0.0",
                path.display()
            );
            return Ok(Self::new());
        }
        Self::from_path(path)
    }

    /// Add or replace the threshold for `(name, target)`
    pub fn insert(&mut self, name: &str, target: f64, threshold: f64) {
        let entries = self.entries.entry(name.to_lowercase()).or_default();
        match entries
            .iter_mut()
            .find(|entry| (entry.0 - target).abs() < TARGET_TOLERANCE)
        {
            Some(entry) => entry.1 = threshold,
            None => entries.push((target, threshold)),
        }
    }

    /// Threshold for `(name, target)`, if present
    pub fn get(&self, name: &str, target: f64) -> Option<f64> {
        self.entries
            .get(&name.to_lowercase())?
            .iter()
            .find(|entry| (entry.0 - target).abs() < TARGET_TOLERANCE)
            .map(|&(_, threshold)| threshold)
    }

    /// Threshold for `(name, target)`; 0.0 with a warning when missing
    pub fn lookup(&self, name: &str, target: f64) -> f64 {
        match self.get(name, target) {
            Some(threshold) => threshold,
            None => {
                log::warn!(
                    "No threshold for {} at target {}. Defaulting to 0.0",
                    name,
                    target
                );
                0.0
            }
        }
    }

    /// Number of `(name, target)` entries
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// True when the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize in the same layout [`ThresholdTable::from_json`] reads
    pub fn to_json(&self) -> Result<String> {
        let raw: BTreeMap<&str, BTreeMap<String, f64>> = self
            .entries
            .iter()
            .map(|(name, entries)| {
                let targets = entries
                    .iter()
                    .map(|(target, threshold)| (target.to_string(), *threshold))
                    .collect();
                (name.as_str(), targets)
            })
            .collect();
        serde_json::to_string_pretty(&raw)
            .map_err(|e| ConfigError::ThresholdFormat(e.to_string()).into())
    }
}

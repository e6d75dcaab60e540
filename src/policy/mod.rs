// AdaSense - Adaptive sampling and budgeted telemetry codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sampling policies
//!
//! A policy decides online, one step at a time, whether the sensor should
//! collect the current measurement, and turns the collected measurements
//! of a sequence into a message.
//!
//! | Policy | Decision |
//! |--------|----------|
//! | `random` | Bernoulli draw at the target rate |
//! | `uniform` | Precomputed, evenly spread schedule |
//! | `adaptive_heuristic` | Skip longer while measurements barely change |
//! | `adaptive_litesense` | Skip driven by an EMA of the signal deviation |
//! | `adaptive_jitter` | Skip length from the recent slope |
//!
//! Random and uniform always use the standard encoding. Adaptive policies
//! use the configured [`EncodingMode`].

mod adaptive;
mod random;
mod uniform;

pub use adaptive::{group_size, AdaptiveState, HeuristicPolicy, JitterPolicy, LiteSensePolicy};
pub use random::RandomPolicy;
pub use uniform::UniformPolicy;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::compression::{default_compressor, Compressor};
use crate::config::{PolicyConfig, ThresholdTable};
use crate::decoder::{decode_standard, Decoded};
use crate::encoder::encode_standard;
use crate::error::{ConfigError, Result};
use crate::protocol::{EncodingMode, EncryptionMode, Measurements, MARGIN};

/// Serializable description of a configured policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    /// Policy name, e.g. `adaptive_heuristic_group`
    pub name: String,
    /// Target collection fraction
    pub target: f64,
    /// Global bit width
    pub width: u32,
    /// Fractional bits
    pub precision: u32,
    /// Encryption mode name
    pub encryption_mode: String,
    /// Encoding mode name (adaptive policies only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// State shared by every policy: configuration, last estimate, RNG and the
/// running collection counters.
#[derive(Debug, Clone)]
pub struct PolicyCore {
    config: PolicyConfig,
    estimate: Vec<f64>,
    rng: StdRng,
    measurement_count: usize,
    seq_count: usize,
    compressor: Option<Arc<dyn Compressor>>,
}

impl PolicyCore {
    /// Validate `config` and set up the shared state
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        let compressor = if config.should_compress {
            Some(default_compressor()?)
        } else {
            None
        };

        Ok(Self {
            estimate: vec![0.0; config.num_features],
            rng: StdRng::seed_from_u64(config.seed),
            measurement_count: 0,
            seq_count: 0,
            compressor,
            config,
        })
    }

    /// Configuration the policy was built with
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Most recently collected measurement (zeros after a reset)
    pub fn estimate(&self) -> &[f64] {
        &self.estimate
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub(crate) fn set_estimate(&mut self, measurement: &[f64]) {
        self.estimate.clear();
        self.estimate.extend_from_slice(measurement);
    }

    pub(crate) fn reset(&mut self) {
        self.estimate = vec![0.0; self.config.num_features];
    }

    pub(crate) fn step(&mut self, count: usize) {
        self.measurement_count += count;
        self.seq_count += 1;
    }

    pub(crate) fn set_compressor(&mut self, compressor: Option<Arc<dyn Compressor>>) {
        self.compressor = compressor;
    }

    /// Standard encoding at the configured width and precision, compressed
    /// when a compressor is set
    pub(crate) fn encode_standard(
        &self,
        measurements: &Measurements,
        collected_indices: &[usize],
    ) -> Result<Vec<u8>> {
        let packed = encode_standard(
            measurements,
            collected_indices,
            self.config.seq_length,
            self.config.width,
            self.config.precision,
        )?;

        match &self.compressor {
            Some(compressor) => compressor.compress(&packed),
            None => Ok(packed),
        }
    }

    pub(crate) fn decode_standard(&self, message: &[u8]) -> Result<Decoded> {
        let decompressed;
        let packed = match &self.compressor {
            Some(compressor) => {
                decompressed = compressor.decompress(message)?;
                &decompressed[..]
            }
            None => message,
        };

        decode_standard(
            packed,
            self.config.seq_length,
            self.config.num_features,
            self.config.width,
            self.config.precision,
        )
    }

    fn summary(&self, name: String, encoding: Option<EncodingMode>) -> PolicySummary {
        PolicySummary {
            name,
            target: self.config.target,
            width: self.config.width,
            precision: self.config.precision,
            encryption_mode: self.config.encryption_mode.as_str().to_string(),
            encoding: encoding.map(|mode| mode.as_str().to_string()),
        }
    }
}

/// A sampling policy
#[derive(Debug, Clone)]
pub enum Policy {
    /// Bernoulli sampling
    Random(RandomPolicy),
    /// Fixed, evenly spread schedule
    Uniform(UniformPolicy),
    /// L1 change against the last estimate
    AdaptiveHeuristic(HeuristicPolicy),
    /// EMA deviation (LiteSense)
    AdaptiveLiteSense(LiteSensePolicy),
    /// Slope-based skip length
    AdaptiveJitter(JitterPolicy),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Policy::Random($p) => $body,
            Policy::Uniform($p) => $body,
            Policy::AdaptiveHeuristic($p) => $body,
            Policy::AdaptiveLiteSense($p) => $body,
            Policy::AdaptiveJitter($p) => $body,
        }
    };
}

impl Policy {
    /// Decide whether to collect the measurement at `seq_idx`
    pub fn should_collect(&mut self, seq_idx: usize) -> bool {
        dispatch!(self, p => p.should_collect(seq_idx))
    }

    /// Update the policy state with a collected measurement
    pub fn collect(&mut self, measurement: &[f64]) {
        dispatch!(self, p => p.collect(measurement))
    }

    /// Clear per-sequence state. Configuration and counters are kept.
    pub fn reset(&mut self) {
        dispatch!(self, p => p.reset())
    }

    /// Record that `count` measurements were collected in the sequence that
    /// just ended
    pub fn step(&mut self, count: usize, _seq_idx: usize) {
        self.core_mut().step(count);
    }

    /// Encode the collected measurements of one sequence
    pub fn encode(
        &self,
        measurements: &Measurements,
        collected_indices: &[usize],
    ) -> Result<Vec<u8>> {
        match self {
            Policy::Random(p) => p.core.encode_standard(measurements, collected_indices),
            Policy::Uniform(p) => p.core.encode_standard(measurements, collected_indices),
            Policy::AdaptiveHeuristic(p) => p.base.encode(measurements, collected_indices),
            Policy::AdaptiveLiteSense(p) => p.base.encode(measurements, collected_indices),
            Policy::AdaptiveJitter(p) => p.base.encode(measurements, collected_indices),
        }
    }

    /// Decode a message produced by [`Policy::encode`]
    pub fn decode(&self, message: &[u8]) -> Result<Decoded> {
        match self {
            Policy::Random(p) => p.core.decode_standard(message),
            Policy::Uniform(p) => p.core.decode_standard(message),
            Policy::AdaptiveHeuristic(p) => p.base.decode(message),
            Policy::AdaptiveLiteSense(p) => p.base.decode(message),
            Policy::AdaptiveJitter(p) => p.base.decode(message),
        }
    }

    /// Policy name, e.g. `uniform` or `adaptive_jitter_group`
    pub fn name(&self) -> String {
        match self {
            Policy::Random(_) => "random".to_string(),
            Policy::Uniform(_) => "uniform".to_string(),
            Policy::AdaptiveHeuristic(p) => p.base.name("adaptive_heuristic"),
            Policy::AdaptiveLiteSense(p) => p.base.name("adaptive_litesense"),
            Policy::AdaptiveJitter(p) => p.base.name("adaptive_jitter"),
        }
    }

    /// Serializable summary of the policy configuration
    pub fn as_dict(&self) -> PolicySummary {
        self.core().summary(self.name(), self.encoding_mode())
    }

    /// Replace the compressor used by the standard encoding
    pub fn with_compressor(mut self, compressor: Option<Arc<dyn Compressor>>) -> Self {
        self.core_mut().set_compressor(compressor);
        self
    }

    /// Shared policy state
    pub fn core(&self) -> &PolicyCore {
        dispatch!(self, p => p.core())
    }

    fn core_mut(&mut self) -> &mut PolicyCore {
        dispatch!(self, p => p.core_mut())
    }

    /// Target collection fraction
    pub fn target(&self) -> f64 {
        self.core().config.target
    }

    /// Global bit width
    pub fn width(&self) -> u32 {
        self.core().config.width
    }

    /// Fractional bits
    pub fn precision(&self) -> u32 {
        self.core().config.precision
    }

    /// Features per measurement
    pub fn num_features(&self) -> usize {
        self.core().config.num_features
    }

    /// Measurements per sequence
    pub fn seq_length(&self) -> usize {
        self.core().config.seq_length
    }

    /// Encryption mode the byte budget accounts for
    pub fn encryption_mode(&self) -> EncryptionMode {
        self.core().config.encryption_mode
    }

    /// Encoding used by adaptive policies; `None` for random and uniform
    pub fn encoding_mode(&self) -> Option<EncodingMode> {
        self.adaptive_state().map(|_| self.core().config.encoding_mode)
    }

    /// Total measurements collected over all finished sequences
    pub fn measurement_count(&self) -> usize {
        self.core().measurement_count
    }

    /// Number of finished sequences
    pub fn seq_count(&self) -> usize {
        self.core().seq_count
    }

    /// Fraction of steps collected over all finished sequences
    pub fn collection_rate(&self) -> f64 {
        let steps = self.seq_count() * self.seq_length();
        if steps == 0 {
            return 0.0;
        }
        self.measurement_count() as f64 / steps as f64
    }

    /// Skip state of adaptive policies
    pub fn adaptive_state(&self) -> Option<&AdaptiveState> {
        match self {
            Policy::Random(_) | Policy::Uniform(_) => None,
            Policy::AdaptiveHeuristic(p) => Some(&p.base.state),
            Policy::AdaptiveLiteSense(p) => Some(&p.base.state),
            Policy::AdaptiveJitter(p) => Some(&p.base.state),
        }
    }

    /// Current skip length (adaptive policies; 0 otherwise)
    pub fn current_skip(&self) -> usize {
        self.adaptive_state().map_or(0, |s| s.current_skip)
    }

    /// Upper bound on the skip length (adaptive policies; 0 otherwise)
    pub fn max_skip(&self) -> usize {
        self.adaptive_state().map_or(0, |s| s.max_skip)
    }
}

/// Build a policy by name.
///
/// `random` and `uniform` aim slightly above the target (by [`MARGIN`]).
/// Adaptive policies take their threshold from `thresholds`, defaulting to
/// 0.0 when it has no entry for the name and target.
pub fn make_policy(name: &str, config: &PolicyConfig, thresholds: &ThresholdTable) -> Result<Policy> {
    let name = name.trim().to_lowercase();
    let config = config.clone();
    let margin_target = config.target + MARGIN;

    match name.as_str() {
        "random" => Ok(Policy::Random(RandomPolicy::new(
            config.with_target(margin_target),
        )?)),
        "uniform" => Ok(Policy::Uniform(UniformPolicy::new(
            config.with_target(margin_target),
        )?)),
        "adaptive_heuristic" | "adaptive_litesense" | "adaptive_jitter" => {
            let threshold = thresholds.lookup(&name, config.target);
            log::debug!("{} threshold at target {}: {}", name, config.target, threshold);

            Ok(match name.as_str() {
                "adaptive_heuristic" => {
                    Policy::AdaptiveHeuristic(HeuristicPolicy::new(config, threshold)?)
                }
                "adaptive_litesense" => {
                    Policy::AdaptiveLiteSense(LiteSensePolicy::new(config, threshold)?)
                }
                _ => Policy::AdaptiveJitter(JitterPolicy::new(config, threshold)?),
            })
        }
        _ => Err(ConfigError::UnknownPolicy(name).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdasenseError;

    fn config() -> PolicyConfig {
        PolicyConfig::new(0.3, 3, 20).with_precision(6)
    }

    #[test]
    fn test_make_policy_names() {
        let thresholds = ThresholdTable::new();
        let group = config().with_encoding(EncodingMode::Group);

        let cases = [
            ("random", config(), "random"),
            ("Uniform", config(), "uniform"),
            ("adaptive_heuristic", config(), "adaptive_heuristic_standard"),
            ("adaptive_litesense", group.clone(), "adaptive_litesense_group"),
            ("adaptive_jitter", group, "adaptive_jitter_group"),
        ];

        for (name, config, expected) in cases {
            let policy = make_policy(name, &config, &thresholds).unwrap();
            assert_eq!(policy.name(), expected);
        }
    }

    #[test]
    fn test_make_policy_unknown() {
        let result = make_policy("skip_rnn", &config(), &ThresholdTable::new());
        assert!(matches!(
            result,
            Err(AdasenseError::Config(ConfigError::UnknownPolicy(_)))
        ));
    }

    #[test]
    fn test_make_policy_margin() {
        let thresholds = ThresholdTable::new();
        let random = make_policy("random", &config(), &thresholds).unwrap();
        assert!((random.target() - (0.3 + MARGIN)).abs() < 1e-12);

        let adaptive = make_policy("adaptive_heuristic", &config(), &thresholds).unwrap();
        assert!((adaptive.target() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_make_policy_threshold_lookup() {
        let mut thresholds = ThresholdTable::new();
        thresholds.insert("adaptive_jitter", 0.3, 2.5);

        let policy = make_policy("adaptive_jitter", &config(), &thresholds).unwrap();
        match policy {
            Policy::AdaptiveJitter(p) => assert_eq!(p.base.state.threshold, 2.5),
            other => panic!("unexpected policy {}", other.name()),
        }

        let policy = make_policy("adaptive_heuristic", &config(), &thresholds).unwrap();
        assert_eq!(policy.adaptive_state().unwrap().threshold, 0.0);
    }

    #[test]
    fn test_as_dict() {
        let thresholds = ThresholdTable::new();
        let policy = make_policy(
            "adaptive_litesense",
            &config().with_encoding(EncodingMode::Group),
            &thresholds,
        )
        .unwrap();

        let summary = policy.as_dict();
        assert_eq!(summary.name, "adaptive_litesense_group");
        assert_eq!(summary.encryption_mode, "STREAM");
        assert_eq!(summary.encoding.as_deref(), Some("GROUP"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["encoding"], "GROUP");

        let uniform = make_policy("uniform", &config(), &thresholds).unwrap();
        let json = serde_json::to_value(uniform.as_dict()).unwrap();
        assert!(json.get("encoding").is_none());
    }

    #[test]
    fn test_step_and_collection_rate() {
        let mut policy = make_policy("random", &config(), &ThresholdTable::new()).unwrap();
        assert_eq!(policy.collection_rate(), 0.0);

        policy.step(5, 0);
        policy.step(7, 1);
        assert_eq!(policy.measurement_count(), 12);
        assert_eq!(policy.seq_count(), 2);
        assert!((policy.collection_rate() - 0.3).abs() < 1e-12);

        // Counters survive a reset
        policy.reset();
        assert_eq!(policy.seq_count(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = PolicyConfig::new(0.0, 3, 20);
        assert!(make_policy("uniform", &bad, &ThresholdTable::new()).is_err());
        assert!(make_policy("adaptive_jitter", &bad, &ThresholdTable::new()).is_err());
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_compressed_standard_roundtrip() {
        let config = config().with_compression(true);
        let policy = make_policy("random", &config, &ThresholdTable::new()).unwrap();

        let m = Measurements::from_rows(&[[0.5, 0.25, -1.0], [0.5, 0.25, -1.0]]).unwrap();
        let message = policy.encode(&m, &[0, 9]).unwrap();
        let (decoded, indices) = policy.decode(&message).unwrap();
        assert_eq!(decoded, m);
        assert_eq!(indices, vec![0, 9]);
    }
}

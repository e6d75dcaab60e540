//! Adaptive policies
//!
//! All three adaptive policies track a skip length bounded by
//! `max_skip = floor(1 / target) + 1`. They differ in how a collected
//! measurement moves the skip length.

use super::PolicyCore;
use crate::config::PolicyConfig;
use crate::decoder::{decode_grouped, Decoded};
use crate::encoder::encode_grouped;
use crate::error::Result;
use crate::planner::{
    get_group_widths, get_max_collected, pad_to_length, prune_sequence, target_bytes,
};
use crate::protocol::{
    validate_indices, EncodingMode, EncryptionMode, Measurements, AES_BLOCK_SIZE, BIT_WIDTH,
    CHACHA_NONCE_LEN, MIN_WIDTH,
};

/// LiteSense mean smoothing factor
const LITESENSE_ALPHA: f64 = 0.7;
/// LiteSense deviation smoothing factor
const LITESENSE_BETA: f64 = 0.7;
/// Keeps the jitter slope division finite
const SLOPE_EPSILON: f64 = 1e-5;

/// Skip bookkeeping shared by the adaptive policies
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveState {
    /// Decision threshold
    pub threshold: f64,
    /// Upper bound on `current_skip`
    pub max_skip: usize,
    /// Steps to skip after the last collection
    pub current_skip: usize,
    /// Steps skipped (heuristic: still to skip) since the last collection
    pub sample_skip: usize,
}

impl AdaptiveState {
    fn new(target: f64, threshold: f64) -> Self {
        Self {
            threshold,
            max_skip: (1.0 / target).floor() as usize + 1,
            current_skip: 0,
            sample_skip: 0,
        }
    }

    fn reset(&mut self) {
        self.current_skip = 0;
        self.sample_skip = 0;
    }

    fn grow_skip(&mut self) {
        self.current_skip = (self.current_skip + 1).min(self.max_skip);
    }
}

/// Shared state and codec selection of the adaptive policies
#[derive(Debug, Clone)]
pub struct AdaptiveBase {
    pub(crate) core: PolicyCore,
    pub(crate) state: AdaptiveState,
}

impl AdaptiveBase {
    fn new(config: PolicyConfig, threshold: f64) -> Result<Self> {
        let core = PolicyCore::new(config)?;
        let state = AdaptiveState::new(core.config().target, threshold);
        Ok(Self { core, state })
    }

    fn reset(&mut self) {
        self.core.reset();
        self.state.reset();
    }

    pub(crate) fn name(&self, prefix: &str) -> String {
        format!(
            "{}_{}",
            prefix,
            self.core.config().encoding_mode.as_str().to_lowercase()
        )
    }

    /// Values per group: one AES block's worth of `BIT_WIDTH` fields
    pub fn group_size(&self) -> usize {
        group_size(self.core.config().num_features)
    }

    pub(crate) fn encode(
        &self,
        measurements: &Measurements,
        collected_indices: &[usize],
    ) -> Result<Vec<u8>> {
        match self.core.config().encoding_mode {
            EncodingMode::Standard => self.core.encode_standard(measurements, collected_indices),
            EncodingMode::Group => self.encode_group(measurements, collected_indices),
        }
    }

    fn encode_group(
        &self,
        measurements: &Measurements,
        collected_indices: &[usize],
    ) -> Result<Vec<u8>> {
        let config = self.core.config();
        validate_indices(measurements, collected_indices, config.seq_length)?;

        let group_size = self.group_size();
        let budget = target_bytes(
            config.target,
            config.num_features,
            config.seq_length,
            config.encryption_mode,
        );
        let max_collected = get_max_collected(
            config.seq_length,
            config.num_features,
            group_size,
            MIN_WIDTH,
            budget,
            config.encryption_mode,
        );

        if collected_indices.len() > max_collected {
            log::debug!(
                "pruning {} collected measurements to {}",
                collected_indices.len(),
                max_collected
            );
        }
        let (measurements, collected_indices) =
            prune_sequence(measurements, collected_indices, max_collected);

        let widths = get_group_widths(
            group_size,
            measurements.len(),
            config.num_features,
            config.seq_length,
            config.target,
            config.encryption_mode,
        );

        let encoded = encode_grouped(
            &measurements,
            &collected_indices,
            config.seq_length,
            &widths,
            self.non_fractional(),
        )?;

        Ok(match config.encryption_mode {
            EncryptionMode::Stream => {
                pad_to_length(encoded, budget.saturating_sub(CHACHA_NONCE_LEN))
            }
            EncryptionMode::Block => encoded,
        })
    }

    pub(crate) fn decode(&self, message: &[u8]) -> Result<Decoded> {
        let config = self.core.config();
        match config.encoding_mode {
            EncodingMode::Standard => self.core.decode_standard(message),
            EncodingMode::Group => decode_grouped(
                message,
                config.seq_length,
                config.num_features,
                self.non_fractional(),
            ),
        }
    }

    fn non_fractional(&self) -> u32 {
        let config = self.core.config();
        config.width.saturating_sub(config.precision)
    }
}

/// Values per group for `num_features` features
pub fn group_size(num_features: usize) -> usize {
    ((BIT_WIDTH as usize * AES_BLOCK_SIZE).div_ceil(num_features.max(1))).max(1)
}

/// Collects when the L1 change since the last collection exceeds the
/// threshold, and otherwise skips a little longer each time.
#[derive(Debug, Clone)]
pub struct HeuristicPolicy {
    pub(crate) base: AdaptiveBase,
}

impl HeuristicPolicy {
    /// Create the policy; fails on an invalid configuration
    pub fn new(config: PolicyConfig, threshold: f64) -> Result<Self> {
        Ok(Self {
            base: AdaptiveBase::new(config, threshold)?,
        })
    }

    pub(crate) fn should_collect(&mut self, _seq_idx: usize) -> bool {
        let state = &mut self.base.state;
        if state.sample_skip > 0 {
            state.sample_skip -= 1;
            return false;
        }
        true
    }

    pub(crate) fn collect(&mut self, measurement: &[f64]) {
        let diff: f64 = self
            .base
            .core
            .estimate()
            .iter()
            .zip(measurement)
            .map(|(e, m)| (e - m).abs())
            .sum();
        self.base.core.set_estimate(measurement);

        let state = &mut self.base.state;
        if diff > state.threshold {
            state.current_skip = 0;
        } else {
            state.grow_skip();
        }
        state.sample_skip = state.current_skip;
    }

    pub(crate) fn reset(&mut self) {
        self.base.reset();
    }

    pub(crate) fn core(&self) -> &PolicyCore {
        &self.base.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.base.core
    }
}

/// LiteSense: exponential moving averages of the signal and of its
/// deviation. A rising deviation shortens the skip.
#[derive(Debug, Clone)]
pub struct LiteSensePolicy {
    pub(crate) base: AdaptiveBase,
    mean: Vec<f64>,
    dev: Vec<f64>,
}

impl LiteSensePolicy {
    /// Create the policy; fails on an invalid configuration
    pub fn new(config: PolicyConfig, threshold: f64) -> Result<Self> {
        let num_features = config.num_features;
        Ok(Self {
            base: AdaptiveBase::new(config, threshold)?,
            mean: vec![0.0; num_features],
            dev: vec![0.0; num_features],
        })
    }

    pub(crate) fn should_collect(&mut self, seq_idx: usize) -> bool {
        let state = &mut self.base.state;
        if seq_idx == 0 || state.sample_skip >= state.current_skip {
            return true;
        }
        state.sample_skip += 1;
        false
    }

    pub(crate) fn collect(&mut self, measurement: &[f64]) {
        let mut diff = 0.0;
        for (j, &x) in measurement.iter().enumerate() {
            if j >= self.mean.len() {
                break;
            }
            let mean = (1.0 - LITESENSE_ALPHA) * self.mean[j] + LITESENSE_ALPHA * x;
            let dev = (1.0 - LITESENSE_BETA) * self.dev[j] + LITESENSE_BETA * (mean - x).abs();
            diff += dev - self.dev[j];
            self.mean[j] = mean;
            self.dev[j] = dev;
        }

        let state = &mut self.base.state;
        if diff > state.threshold {
            state.current_skip = if diff >= 1.0 {
                0
            } else {
                state.current_skip.saturating_sub(1)
            };
        } else {
            state.grow_skip();
        }
        state.sample_skip = 0;

        self.base.core.set_estimate(measurement);
    }

    pub(crate) fn reset(&mut self) {
        self.base.reset();
        self.mean.fill(0.0);
        self.dev.fill(0.0);
    }

    pub(crate) fn core(&self) -> &PolicyCore {
        &self.base.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.base.core
    }
}

/// Skips for as many steps as the threshold allows at the current slope
#[derive(Debug, Clone)]
pub struct JitterPolicy {
    pub(crate) base: AdaptiveBase,
    prev: Vec<f64>,
}

impl JitterPolicy {
    /// Create the policy; fails on an invalid configuration
    pub fn new(config: PolicyConfig, threshold: f64) -> Result<Self> {
        let num_features = config.num_features;
        Ok(Self {
            base: AdaptiveBase::new(config, threshold)?,
            prev: vec![0.0; num_features],
        })
    }

    pub(crate) fn should_collect(&mut self, seq_idx: usize) -> bool {
        let state = &mut self.base.state;
        if seq_idx > 0 && state.sample_skip < state.current_skip {
            state.sample_skip += 1;
            return false;
        }
        true
    }

    pub(crate) fn collect(&mut self, measurement: &[f64]) {
        self.prev.clear();
        self.prev.extend_from_slice(self.base.core.estimate());
        self.base.core.set_estimate(measurement);

        let state = &mut self.base.state;
        let span = (state.current_skip + 1) as f64;
        let slope_norm: f64 = measurement
            .iter()
            .zip(&self.prev)
            .map(|(m, p)| ((m - p) / span).abs())
            .sum();

        let num_steps = state.threshold / (slope_norm + SLOPE_EPSILON);
        // Saturating float-to-int cast; negative thresholds give 0
        state.current_skip = (num_steps as usize).min(state.max_skip);
        state.sample_skip = 0;
    }

    pub(crate) fn reset(&mut self) {
        self.base.reset();
        self.prev.fill(0.0);
    }

    pub(crate) fn core(&self) -> &PolicyCore {
        &self.base.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.base.core
    }
}

// AdaSense - Adaptive sampling and budgeted telemetry codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Run a policy over a dataset and measure what the receiver gets.

use crate::error::{Result, SimError};
use crate::signal::{default_classes, generate_dataset, Dataset};
use adasense::{
    make_policy, mean_absolute_error, reconstruct_sequence, run_sequences, EncodingMode,
    EncryptionMode, Policy, PolicyConfig, PolicySummary, SamplingMetrics, ThresholdTable,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Policy name
    pub policy: String,
    /// Target collection fraction
    pub target: f64,
    /// Message layout for adaptive policies
    pub encoding: EncodingMode,
    /// Encryption the budget accounts for
    pub encryption: EncryptionMode,
    /// Sequences generated per class
    pub sequences_per_class: usize,
    /// Steps per sequence
    pub seq_length: usize,
    /// Features per step
    pub num_features: usize,
    /// Fractional bits
    pub precision: u32,
    /// Seed for both the dataset and the policy
    pub seed: u64,
    /// Adaptive thresholds
    pub thresholds: ThresholdTable,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            policy: "adaptive_heuristic".to_string(),
            target: 0.5,
            encoding: EncodingMode::Standard,
            encryption: EncryptionMode::Stream,
            sequences_per_class: 20,
            seq_length: 50,
            num_features: 3,
            precision: 10,
            seed: adasense::protocol::DEFAULT_SEED,
            thresholds: ThresholdTable::new(),
        }
    }
}

impl SimulationConfig {
    /// Policy configuration for these parameters.
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig::new(self.target, self.num_features, self.seq_length)
            .with_precision(self.precision)
            .with_encoding(self.encoding)
            .with_encryption(self.encryption)
            .with_seed(self.seed)
    }

    /// Build the configured policy.
    pub fn build_policy(&self) -> Result<Policy> {
        Ok(make_policy(
            &self.policy,
            &self.policy_config(),
            &self.thresholds,
        )?)
    }

    /// Generate the built-in dataset.
    pub fn dataset(&self) -> Result<Dataset> {
        generate_dataset(
            &default_classes(self.num_features),
            self.sequences_per_class,
            self.seq_length,
            self.seed,
        )
    }
}

/// Outcome of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Policy description
    pub policy: PolicySummary,
    /// Class label of each sequence
    pub labels: Vec<String>,
    /// Message size of each sequence
    pub num_bytes: Vec<usize>,
    /// Fraction of steps collected
    pub collection_rate: f64,
    /// Mean absolute error of the receiver's reconstruction
    pub mae: f64,
    /// Standard deviation of message sizes
    pub byte_std_dev: f64,
}

/// Run `policy` over every sequence of `dataset`.
///
/// Each message is decoded and the full sequence rebuilt by interpolation,
/// so `mae` reflects sampling loss, quantization and any pruning.
pub fn simulate(policy: &mut Policy, dataset: &Dataset) -> Result<SimulationReport> {
    if policy.seq_length() != dataset.seq_length {
        return Err(SimError::SequenceLength {
            expected: policy.seq_length(),
            actual: dataset.seq_length,
        });
    }

    let outcomes = run_sequences(policy, &dataset.sequences)?;
    let mut metrics = SamplingMetrics::new();

    for ((outcome, sequence), label) in outcomes
        .iter()
        .zip(&dataset.sequences)
        .zip(&dataset.labels)
    {
        let (decoded, indices) = policy.decode(&outcome.message)?;
        let rebuilt = reconstruct_sequence(&decoded, &indices, dataset.seq_length);
        let error = mean_absolute_error(sequence, &rebuilt);

        debug!(
            label = %label,
            collected = outcome.num_collected(),
            sent = indices.len(),
            bytes = outcome.num_bytes(),
            mae = error,
            "Sequence done"
        );

        metrics.record_outcome(outcome, dataset.seq_length);
        let num_values = sequence.as_slice().len();
        metrics.record_error(error * num_values as f64, num_values);
    }

    let report = SimulationReport {
        policy: policy.as_dict(),
        labels: dataset.labels.clone(),
        num_bytes: outcomes.iter().map(|o| o.num_bytes()).collect(),
        collection_rate: metrics.collection_rate(),
        mae: metrics.mae(),
        byte_std_dev: metrics.byte_std_dev(),
    };

    info!(
        policy = %report.policy.name,
        sequences = dataset.len(),
        collection_rate = report.collection_rate,
        avg_bytes = metrics.average_message_bytes(),
        mae = report.mae,
        "Simulation complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adasense::planner::target_bytes;
    use adasense::protocol::CHACHA_NONCE_LEN;

    fn config(policy: &str) -> SimulationConfig {
        SimulationConfig {
            policy: policy.to_string(),
            sequences_per_class: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_uniform_sizes_constant() {
        let config = config("uniform");
        let mut policy = config.build_policy().unwrap();
        let dataset = config.dataset().unwrap();

        let report = simulate(&mut policy, &dataset).unwrap();

        assert_eq!(report.num_bytes.len(), 15);
        assert_eq!(report.labels, dataset.labels);
        assert_eq!(report.byte_std_dev, 0.0);
        assert!(report.mae.is_finite());
    }

    #[test]
    fn test_group_stream_sizes_constant() {
        let mut config = config("adaptive_litesense");
        config.encoding = EncodingMode::Group;
        config.target = 0.3;
        config.thresholds.insert("adaptive_litesense", 0.3, 0.1);

        let mut policy = config.build_policy().unwrap();
        let dataset = config.dataset().unwrap();
        let report = simulate(&mut policy, &dataset).unwrap();

        let expected = target_bytes(0.3, 3, 50, EncryptionMode::Stream) - CHACHA_NONCE_LEN;
        assert!(report.num_bytes.iter().all(|n| *n == expected));
        assert_eq!(report.policy.encoding.as_deref(), Some("GROUP"));
    }

    #[test]
    fn test_full_collection_is_near_exact() {
        let mut config = config("uniform");
        config.target = 1.0;

        let mut policy = config.build_policy().unwrap();
        let dataset = config.dataset().unwrap();
        let report = simulate(&mut policy, &dataset).unwrap();

        assert_eq!(report.collection_rate, 1.0);
        assert!(report.mae <= 1.0 / 1024.0);
    }

    #[test]
    fn test_sequence_length_mismatch() {
        let config = config("random");
        let mut policy = config.build_policy().unwrap();
        let dataset = SimulationConfig {
            seq_length: 20,
            ..config.clone()
        }
        .dataset()
        .unwrap();

        assert!(matches!(
            simulate(&mut policy, &dataset),
            Err(SimError::SequenceLength {
                expected: 50,
                actual: 20
            })
        ));
    }

    #[test]
    fn test_unknown_policy() {
        assert!(matches!(
            config("skip_rnn").build_policy(),
            Err(SimError::Adasense(_))
        ));
    }

    #[test]
    fn test_report_serializes() {
        let config = config("random");
        let mut policy = config.build_policy().unwrap();
        let report = simulate(&mut policy, &config.dataset().unwrap()).unwrap();

        let json = serde_json::to_string(&report).unwrap();
        let back: SimulationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_bytes, report.num_bytes);
        assert_eq!(back.policy, report.policy);
    }
}

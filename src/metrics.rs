//! Metrics collection for AdaSense runs
//!
//! This module provides statistics about collection rate, message sizes
//! and reconstruction error over many sequences. Message size spread is
//! reported on its own because variable sizes leak which sequences the
//! policy found interesting.

use std::collections::HashMap;

use crate::driver::SequenceOutcome;

/// Bytes of one uncompressed `f64` feature
const RAW_VALUE_BYTES: u64 = 8;

/// Sampling and message statistics collector
#[derive(Debug, Clone, Default)]
pub struct SamplingMetrics {
    /// Sequences processed
    pub sequence_count: u64,
    /// Time steps seen
    pub step_count: u64,
    /// Measurements collected
    pub collected_count: u64,
    /// Bytes of the raw sequences as `f64`
    pub raw_bytes: u64,
    /// Bytes of all messages
    pub message_bytes: u64,
    /// Sum of squared message sizes
    message_bytes_sq: f64,
    /// Message size distribution
    pub size_distribution: HashMap<usize, u64>,
    /// Sum of absolute reconstruction errors
    abs_error_sum: f64,
    /// Values the reconstruction error was measured over
    error_values: u64,
}

impl SamplingMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sequence of `seq_length` steps with `num_features`
    /// features, of which `num_collected` were sent in `num_bytes` bytes
    pub fn record_sequence(
        &mut self,
        seq_length: usize,
        num_features: usize,
        num_collected: usize,
        num_bytes: usize,
    ) {
        self.sequence_count += 1;
        self.step_count += seq_length as u64;
        self.collected_count += num_collected as u64;
        self.raw_bytes += (seq_length * num_features) as u64 * RAW_VALUE_BYTES;
        self.message_bytes += num_bytes as u64;
        self.message_bytes_sq += (num_bytes as f64).powi(2);
        *self.size_distribution.entry(num_bytes).or_insert(0) += 1;
    }

    /// Record a driver outcome for a sequence of `seq_length` steps
    pub fn record_outcome(&mut self, outcome: &SequenceOutcome, seq_length: usize) {
        self.record_sequence(
            seq_length,
            outcome.collected.num_features(),
            outcome.num_collected(),
            outcome.num_bytes(),
        );
    }

    /// Record reconstruction error: `abs_error_sum` over `num_values` values
    pub fn record_error(&mut self, abs_error_sum: f64, num_values: usize) {
        self.abs_error_sum += abs_error_sum;
        self.error_values += num_values as u64;
    }

    /// Fraction of steps collected (0.0 - 1.0)
    pub fn collection_rate(&self) -> f64 {
        if self.step_count == 0 {
            return 0.0;
        }
        self.collected_count as f64 / self.step_count as f64
    }

    /// Average message size in bytes
    pub fn average_message_bytes(&self) -> f64 {
        if self.sequence_count == 0 {
            return 0.0;
        }
        self.message_bytes as f64 / self.sequence_count as f64
    }

    /// Population standard deviation of message sizes
    pub fn byte_std_dev(&self) -> f64 {
        if self.sequence_count == 0 {
            return 0.0;
        }
        let n = self.sequence_count as f64;
        let mean = self.average_message_bytes();
        (self.message_bytes_sq / n - mean * mean).max(0.0).sqrt()
    }

    /// Number of distinct message sizes seen
    pub fn distinct_sizes(&self) -> usize {
        self.size_distribution.len()
    }

    /// Most frequent message size (smallest on ties)
    pub fn most_common_size(&self) -> Option<usize> {
        self.size_distribution
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(size, _)| *size)
    }

    /// Raw bytes over message bytes (higher = better)
    pub fn compression_ratio(&self) -> f64 {
        if self.message_bytes == 0 {
            return 1.0;
        }
        self.raw_bytes as f64 / self.message_bytes as f64
    }

    /// Mean absolute reconstruction error
    pub fn mae(&self) -> f64 {
        if self.error_values == 0 {
            return 0.0;
        }
        self.abs_error_sum / self.error_values as f64
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== AdaSense Sampling Metrics ===\n\n");

        report.push_str(&format!("Sequences processed: {}\n", self.sequence_count));
        report.push_str(&format!(
            "Collected: {} of {} steps ({:.1}%)\n",
            self.collected_count,
            self.step_count,
            self.collection_rate() * 100.0
        ));
        report.push_str(&format!(
            "Average message size: {:.1} bytes (std dev {:.2})\n",
            self.average_message_bytes(),
            self.byte_std_dev()
        ));
        report.push_str(&format!(
            "Compression ratio: {:.2}x\n",
            self.compression_ratio()
        ));

        if self.error_values > 0 {
            report.push_str(&format!("Reconstruction MAE: {:.5}\n", self.mae()));
        }

        report.push_str("\nMessage sizes:\n");
        let mut sizes: Vec<_> = self.size_distribution.iter().collect();
        sizes.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (size, count) in sizes {
            let percent = (*count as f64 / self.sequence_count.max(1) as f64) * 100.0;
            report.push_str(&format!("  {} bytes: {} ({:.1}%)\n", size, count, percent));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_collection_rate() {
        let mut metrics = SamplingMetrics::new();
        metrics.record_sequence(20, 3, 6, 40);
        metrics.record_sequence(20, 3, 8, 40);

        assert_relative_eq!(metrics.collection_rate(), 0.35);
        assert_eq!(metrics.raw_bytes, 960);
        assert_relative_eq!(metrics.compression_ratio(), 12.0);
    }

    #[test]
    fn test_message_size_spread() {
        let mut metrics = SamplingMetrics::new();
        metrics.record_sequence(10, 1, 5, 10);
        metrics.record_sequence(10, 1, 5, 14);
        metrics.record_sequence(10, 1, 5, 14);

        assert_relative_eq!(metrics.average_message_bytes(), 38.0 / 3.0);
        assert_eq!(metrics.distinct_sizes(), 2);
        assert_eq!(metrics.most_common_size(), Some(14));
        assert!(metrics.byte_std_dev() > 1.8 && metrics.byte_std_dev() < 1.9);
    }

    #[test]
    fn test_constant_sizes_have_no_spread() {
        let mut metrics = SamplingMetrics::new();
        for _ in 0..5 {
            metrics.record_sequence(50, 6, 12, 189);
        }
        assert_relative_eq!(metrics.byte_std_dev(), 0.0);
        assert_eq!(metrics.distinct_sizes(), 1);
    }

    #[test]
    fn test_mae() {
        let mut metrics = SamplingMetrics::new();
        metrics.record_error(1.0, 10);
        metrics.record_error(0.5, 10);
        assert_relative_eq!(metrics.mae(), 0.075);
    }

    #[test]
    fn test_report_generation() {
        let mut metrics = SamplingMetrics::new();
        metrics.record_sequence(20, 3, 6, 40);
        metrics.record_error(0.2, 60);

        let report = metrics.report();
        assert!(report.contains("Collected: 6 of 20"));
        assert!(report.contains("40 bytes"));
        assert!(report.contains("MAE"));
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = SamplingMetrics::new();

        assert_eq!(metrics.collection_rate(), 0.0);
        assert_eq!(metrics.average_message_bytes(), 0.0);
        assert_eq!(metrics.byte_std_dev(), 0.0);
        assert_eq!(metrics.compression_ratio(), 1.0);
        assert_eq!(metrics.most_common_size(), None);
    }

    #[test]
    fn test_reset() {
        let mut metrics = SamplingMetrics::new();
        metrics.record_sequence(20, 3, 6, 40);
        metrics.record_error(1.0, 3);

        metrics.reset();

        assert_eq!(metrics.sequence_count, 0);
        assert_eq!(metrics.message_bytes, 0);
        assert_eq!(metrics.mae(), 0.0);
    }
}

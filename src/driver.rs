//! Policy driver
//!
//! Runs a policy over whole sequences: one forward pass deciding what to
//! collect, then the policy's encode path.

use crate::error::{Result, ShapeError};
use crate::policy::Policy;
use crate::protocol::Measurements;

/// Result of running a policy over one sequence
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceOutcome {
    /// Measurements the policy collected
    pub collected: Measurements,
    /// Sequence positions of the collected measurements
    pub collected_indices: Vec<usize>,
    /// Encoded message
    pub message: Vec<u8>,
}

impl SequenceOutcome {
    /// Number of collected measurements
    pub fn num_collected(&self) -> usize {
        self.collected_indices.len()
    }

    /// Message size in bytes
    pub fn num_bytes(&self) -> usize {
        self.message.len()
    }
}

/// Run `policy` over one sequence and return what it collected.
///
/// The policy is not reset first.
pub fn run_policy(policy: &mut Policy, sequence: &Measurements) -> Result<(Measurements, Vec<usize>)> {
    if sequence.num_features() != policy.num_features() {
        return Err(ShapeError::FeatureMismatch {
            expected: policy.num_features(),
            actual: sequence.num_features(),
        }
        .into());
    }

    let mut collected = Measurements::empty(sequence.num_features());
    let mut collected_indices = Vec::new();

    for (seq_idx, measurement) in sequence.rows().enumerate() {
        if policy.should_collect(seq_idx) {
            policy.collect(measurement);
            collected.push_row(measurement)?;
            collected_indices.push(seq_idx);
        }
    }

    Ok((collected, collected_indices))
}

/// Reset, run, encode and step the policy for each sequence in turn
pub fn run_sequences(policy: &mut Policy, sequences: &[Measurements]) -> Result<Vec<SequenceOutcome>> {
    let mut outcomes = Vec::with_capacity(sequences.len());

    for (seq_idx, sequence) in sequences.iter().enumerate() {
        policy.reset();
        let (collected, collected_indices) = run_policy(policy, sequence)?;
        let message = policy.encode(&collected, &collected_indices)?;
        policy.step(collected_indices.len(), seq_idx);

        log::trace!(
            "sequence {}: collected {} of {}, {} bytes",
            seq_idx,
            collected_indices.len(),
            sequence.len(),
            message.len()
        );

        outcomes.push(SequenceOutcome {
            collected,
            collected_indices,
            message,
        });
    }

    Ok(outcomes)
}

//! Uniform policy
//!
//! The schedule is drawn once, at construction: strides of `floor(1/target)`
//! or `ceil(1/target)` picked so their mean matches `1/target`, clamped so
//! that exactly `ceil(target * T)` indices fit in the sequence.

use rand::Rng;

use super::PolicyCore;
use crate::config::PolicyConfig;
use crate::error::Result;
use crate::protocol::target_count;

/// Collects at a fixed, evenly spread set of indices
#[derive(Debug, Clone)]
pub struct UniformPolicy {
    pub(crate) core: PolicyCore,
    schedule: Vec<usize>,
    cursor: usize,
}

impl UniformPolicy {
    /// Create the policy and draw its schedule
    pub fn new(config: PolicyConfig) -> Result<Self> {
        let mut core = PolicyCore::new(config)?;
        let (target, seq_length) = (core.config().target, core.config().seq_length);
        let schedule = build_schedule(target, seq_length, core.rng());

        Ok(Self {
            core,
            schedule,
            cursor: 0,
        })
    }

    /// Indices collected in every sequence
    pub fn schedule(&self) -> &[usize] {
        &self.schedule
    }

    pub(crate) fn should_collect(&mut self, seq_idx: usize) -> bool {
        let scheduled = self.schedule.get(self.cursor) == Some(&seq_idx);
        if seq_idx == 0 || scheduled {
            self.cursor += 1;
            return true;
        }
        false
    }

    pub(crate) fn collect(&mut self, measurement: &[f64]) {
        self.core.set_estimate(measurement);
    }

    pub(crate) fn reset(&mut self) {
        self.core.reset();
        self.cursor = 0;
    }

    pub(crate) fn core(&self) -> &PolicyCore {
        &self.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.core
    }
}

fn build_schedule<R: Rng>(target: f64, seq_length: usize, rng: &mut R) -> Vec<usize> {
    let count = target_count(target, seq_length);
    let skip = (1.0 / target).max(1.0);
    let frac = skip - skip.floor();
    let (short, long) = (skip.floor() as usize, skip.ceil() as usize);

    let mut schedule = Vec::with_capacity(count);
    let mut index = 0;
    while index < seq_length && schedule.len() < count {
        schedule.push(index);

        let need = count - schedule.len();
        if need == 0 {
            break;
        }

        let slots = seq_length - index - 1;
        if need >= slots {
            index += 1;
        } else {
            let r: f64 = rng.gen();
            let stride = if r > frac { short } else { long };
            index += stride.clamp(1, seq_length - index - need);
        }
    }

    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(policy: &mut UniformPolicy, seq_length: usize) -> Vec<usize> {
        (0..seq_length).filter(|&t| policy.should_collect(t)).collect()
    }

    #[test]
    fn test_exact_count_across_targets() {
        let mut rng = StdRng::seed_from_u64(3);
        for seq_length in [1, 7, 20, 50, 206] {
            for target in [0.1, 0.2, 0.3, 0.305, 0.45, 0.5, 0.7, 0.9, 1.0] {
                let schedule = build_schedule(target, seq_length, &mut rng);
                assert_eq!(schedule.len(), target_count(target, seq_length));
                assert_eq!(schedule[0], 0);
                assert!(schedule.windows(2).all(|w| w[0] < w[1]));
                assert!(schedule.iter().all(|&i| i < seq_length));
            }
        }
    }

    #[test]
    fn test_integer_stride() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(build_schedule(0.25, 12, &mut rng), vec![0, 4, 8]);
        assert_eq!(build_schedule(0.5, 6, &mut rng), vec![0, 2, 4]);
    }

    #[test]
    fn test_policy_collects_schedule_every_sequence() {
        let mut policy = UniformPolicy::new(PolicyConfig::new(0.3, 2, 20)).unwrap();
        let expected = policy.schedule().to_vec();
        assert_eq!(expected.len(), 6);

        assert_eq!(run(&mut policy, 20), expected);
        policy.reset();
        assert_eq!(run(&mut policy, 20), expected);
    }
}

//! Random policy

use rand::Rng;

use super::PolicyCore;
use crate::config::PolicyConfig;
use crate::error::Result;

/// Collects each step independently with probability `target`. The first
/// step is always collected.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    pub(crate) core: PolicyCore,
}

impl RandomPolicy {
    /// Create the policy; fails on an invalid configuration
    pub fn new(config: PolicyConfig) -> Result<Self> {
        Ok(Self {
            core: PolicyCore::new(config)?,
        })
    }

    pub(crate) fn should_collect(&mut self, seq_idx: usize) -> bool {
        let target = self.core.config().target;
        let r: f64 = self.core.rng().gen();
        r < target || seq_idx == 0
    }

    pub(crate) fn collect(&mut self, measurement: &[f64]) {
        self.core.set_estimate(measurement);
    }

    pub(crate) fn reset(&mut self) {
        self.core.reset();
    }

    pub(crate) fn core(&self) -> &PolicyCore {
        &self.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.core
    }
}

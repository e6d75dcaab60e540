// AdaSense - Adaptive sampling and budgeted telemetry codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Synthetic signal patterns and labelled sequence datasets.
//!
//! A [`SequenceClass`] gives one [`SignalPattern`] per feature. Every
//! generated sequence starts at a random offset into its patterns and gets
//! Gaussian noise on top, so sequences of one class look alike without
//! being identical.

use crate::error::{Result, SimError};
use adasense::Measurements;
use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Signal pattern over discrete time steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignalPattern {
    /// Constant value.
    Constant { value: f64 },

    /// Sinusoidal wave.
    ///
    /// `value = offset + amplitude * sin(2*PI*t/period + phase)`
    Sine {
        amplitude: f64,
        period: usize,
        phase: f64,
        offset: f64,
    },

    /// Random walk (Brownian motion).
    RandomWalk { start: f64, step_std: f64 },

    /// Step function: `(step, value)` pairs, each value holding until the
    /// next step.
    Step { levels: Vec<(usize, f64)> },

    /// Sawtooth wave (linear ramp with reset).
    Sawtooth {
        min: f64,
        max: f64,
        period: usize,
        ascending: bool,
    },

    /// Sum of multiple patterns.
    Composite(Vec<SignalPattern>),
}

impl SignalPattern {
    /// Generate `length` values starting at step `start`.
    pub fn generate(&self, start: usize, length: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
        match self {
            SignalPattern::Constant { value } => Ok(vec![*value; length]),

            SignalPattern::Sine {
                amplitude,
                period,
                phase,
                offset,
            } => {
                let period = (*period).max(1) as f64;
                Ok((start..start + length)
                    .map(|t| offset + amplitude * (2.0 * PI * t as f64 / period + phase).sin())
                    .collect())
            }

            SignalPattern::RandomWalk { start: origin, step_std } => {
                let normal = Normal::new(0.0, *step_std).map_err(|e| {
                    SimError::InvalidPattern(format!("random walk step_std {}: {}", step_std, e))
                })?;
                let mut value = *origin;
                Ok((0..length)
                    .map(|_| {
                        value += normal.sample(rng);
                        value
                    })
                    .collect())
            }

            SignalPattern::Step { levels } => Ok((start..start + length)
                .map(|t| {
                    levels
                        .iter()
                        .take_while(|(at, _)| t >= *at)
                        .last()
                        .or(levels.first())
                        .map(|(_, v)| *v)
                        .unwrap_or(0.0)
                })
                .collect()),

            SignalPattern::Sawtooth {
                min,
                max,
                period,
                ascending,
            } => {
                let period = (*period).max(1);
                Ok((start..start + length)
                    .map(|t| {
                        let fraction = (t % period) as f64 / period as f64;
                        if *ascending {
                            min + (max - min) * fraction
                        } else {
                            max - (max - min) * fraction
                        }
                    })
                    .collect())
            }

            SignalPattern::Composite(parts) => {
                let mut total = vec![0.0; length];
                for part in parts {
                    for (acc, v) in total.iter_mut().zip(part.generate(start, length, rng)?) {
                        *acc += v;
                    }
                }
                Ok(total)
            }
        }
    }

    /// Number of steps after which a deterministic pattern repeats.
    fn period(&self) -> Option<usize> {
        match self {
            SignalPattern::Sine { period, .. } | SignalPattern::Sawtooth { period, .. } => {
                Some((*period).max(1))
            }
            _ => None,
        }
    }
}

/// A labelled class of sequences: one pattern per feature plus noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceClass {
    /// Class label
    pub label: String,
    /// Pattern for each feature
    pub features: Vec<SignalPattern>,
    /// Standard deviation of the additive Gaussian noise
    pub noise_std: f64,
}

impl SequenceClass {
    /// Create a class with no noise.
    pub fn new(label: impl Into<String>, features: Vec<SignalPattern>) -> Self {
        Self {
            label: label.into(),
            features,
            noise_std: 0.0,
        }
    }

    /// Set the noise level.
    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    /// Number of features.
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Generate one sequence of `seq_length` steps.
    pub fn generate(&self, seq_length: usize, rng: &mut StdRng) -> Result<Measurements> {
        let noise = Normal::new(0.0, self.noise_std).map_err(|e| {
            SimError::InvalidPattern(format!("{} noise_std {}: {}", self.label, self.noise_std, e))
        })?;

        let columns = self
            .features
            .iter()
            .map(|pattern| {
                let offset = match pattern.period() {
                    Some(period) => rng.gen_range(0..period),
                    None => rng.gen_range(0..seq_length.max(1)),
                };
                pattern.generate(offset, seq_length, rng)
            })
            .collect::<Result<Vec<_>>>()?;

        let num_features = self.features.len();
        let mut values = Vec::with_capacity(seq_length * num_features);
        for t in 0..seq_length {
            for column in &columns {
                values.push(column[t] + noise.sample(rng));
            }
        }
        Ok(Measurements::new(num_features, values)?)
    }
}

/// Labelled sequences of one shape.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Generated sequences
    pub sequences: Vec<Measurements>,
    /// Class label for each sequence
    pub labels: Vec<String>,
    /// Steps per sequence
    pub seq_length: usize,
    /// Features per step
    pub num_features: usize,
}

impl Dataset {
    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// True if there are no sequences.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Generate `per_class` sequences of every class, shuffled with `seed`.
pub fn generate_dataset(
    classes: &[SequenceClass],
    per_class: usize,
    seq_length: usize,
    seed: u64,
) -> Result<Dataset> {
    let first = classes.first().ok_or(SimError::NoClasses)?;
    let num_features = first.num_features();
    for class in classes {
        if class.num_features() != num_features {
            return Err(SimError::FeatureMismatch {
                label: class.label.clone(),
                expected: num_features,
                actual: class.num_features(),
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(classes.len() * per_class);
    for class in classes {
        for _ in 0..per_class {
            samples.push((class.generate(seq_length, &mut rng)?, class.label.clone()));
        }
    }
    samples.shuffle(&mut rng);

    let (sequences, labels) = samples.into_iter().unzip();
    Ok(Dataset {
        sequences,
        labels,
        seq_length,
        num_features,
    })
}

/// Built-in classes with `num_features` features each.
///
/// - `idle`: flat readings around a per-feature level
/// - `periodic`: slow sine waves
/// - `drift`: random walks
/// - `switching`: step changes between two levels
/// - `ramp`: sawtooth on top of a faster ripple
pub fn default_classes(num_features: usize) -> Vec<SequenceClass> {
    let per_feature = |f: &dyn Fn(usize) -> SignalPattern| -> Vec<SignalPattern> {
        (0..num_features).map(f).collect()
    };

    vec![
        SequenceClass::new(
            "idle",
            per_feature(&|j| SignalPattern::Constant {
                value: 0.5 * j as f64,
            }),
        )
        .with_noise(0.01),
        SequenceClass::new(
            "periodic",
            per_feature(&|j| SignalPattern::Sine {
                amplitude: 1.0,
                period: 25 + 5 * j,
                phase: j as f64,
                offset: 0.0,
            }),
        )
        .with_noise(0.02),
        SequenceClass::new(
            "drift",
            per_feature(&|_| SignalPattern::RandomWalk {
                start: 0.0,
                step_std: 0.1,
            }),
        ),
        SequenceClass::new(
            "switching",
            per_feature(&|j| SignalPattern::Step {
                levels: vec![(0, -1.0), (20 + 3 * j, 1.0), (60 + 3 * j, -1.0)],
            }),
        )
        .with_noise(0.02),
        SequenceClass::new(
            "ramp",
            per_feature(&|j| {
                SignalPattern::Composite(vec![
                    SignalPattern::Sawtooth {
                        min: -1.0,
                        max: 1.0,
                        period: 40,
                        ascending: j % 2 == 0,
                    },
                    SignalPattern::Sine {
                        amplitude: 0.1,
                        period: 6,
                        phase: 0.0,
                        offset: 0.0,
                    },
                ])
            }),
        )
        .with_noise(0.01),
    ]
}

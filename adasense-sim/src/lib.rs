// AdaSense - Adaptive sampling and budgeted telemetry codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # AdaSense Sim
//!
//! Synthetic sensor sequences and a harness that drives AdaSense policies
//! over them, decodes every message and reports sizes and reconstruction
//! error.
//!
//! ## Quick Start
//!
//! ```rust
//! use adasense_sim::{simulate, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     policy: "uniform".to_string(),
//!     sequences_per_class: 2,
//!     ..Default::default()
//! };
//!
//! let mut policy = config.build_policy().unwrap();
//! let dataset = config.dataset().unwrap();
//! let report = simulate(&mut policy, &dataset).unwrap();
//!
//! assert_eq!(report.num_bytes.len(), dataset.len());
//! ```

pub mod error;
pub mod signal;
pub mod simulate;

pub use error::{Result, SimError};
pub use signal::{default_classes, generate_dataset, Dataset, SequenceClass, SignalPattern};
pub use simulate::{simulate, SimulationConfig, SimulationReport};

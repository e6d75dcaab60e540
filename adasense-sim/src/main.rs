// AdaSense - Adaptive sampling and budgeted telemetry codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # AdaSense Sim
//!
//! Run a sampling policy over synthetic sequences and print a JSON report.
//!
//! ## Usage
//!
//! ```bash
//! # Adaptive policy, budgeted group encoding
//! adasense-sim --policy adaptive_litesense --target 0.3 --encoding group
//!
//! # Thresholds from file, report to disk
//! adasense-sim --thresholds thresholds.json --output report.json
//! ```

use adasense::{EncodingMode, EncryptionMode, ThresholdTable};
use adasense_sim::{simulate, SimError, SimulationConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// AdaSense policy simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Policy name (random, uniform, adaptive_heuristic, adaptive_litesense, adaptive_jitter)
    #[arg(short, long, default_value = "adaptive_heuristic")]
    policy: String,

    /// Target collection fraction
    #[arg(short, long, default_value = "0.5")]
    target: f64,

    /// Encoding mode (standard, group)
    #[arg(short, long, default_value = "standard")]
    encoding: EncodingMode,

    /// Encryption mode the budget accounts for (stream, block)
    #[arg(long, default_value = "stream")]
    encryption: EncryptionMode,

    /// Sequences per signal class
    #[arg(short, long, default_value = "20")]
    sequences: usize,

    /// Steps per sequence
    #[arg(long, default_value = "50")]
    seq_length: usize,

    /// Features per step
    #[arg(long, default_value = "3")]
    features: usize,

    /// Threshold table (JSON)
    #[arg(long)]
    thresholds: Option<PathBuf>,

    /// Fractional bits
    #[arg(long, default_value = "10")]
    precision: u32,

    /// Random seed
    #[arg(long, default_value_t = adasense::protocol::DEFAULT_SEED)]
    seed: u64,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("AdaSense Sim v{}", env!("CARGO_PKG_VERSION"));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), SimError> {
    let thresholds = match &args.thresholds {
        Some(path) => ThresholdTable::load_or_default(path)?,
        None => ThresholdTable::new(),
    };
    info!("Loaded {} threshold entries", thresholds.len());

    let config = SimulationConfig {
        policy: args.policy,
        target: args.target,
        encoding: args.encoding,
        encryption: args.encryption,
        sequences_per_class: args.sequences,
        seq_length: args.seq_length,
        num_features: args.features,
        precision: args.precision,
        seed: args.seed,
        thresholds,
    };

    let mut policy = config.build_policy()?;
    let dataset = config.dataset()?;
    info!(
        "Dataset generated: {} sequences of {} x {}",
        dataset.len(),
        dataset.seq_length,
        dataset.num_features
    );

    let report = simulate(&mut policy, &dataset)?;
    let json = serde_json::to_string_pretty(&report)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

//! Error types for the simulator

use adasense::AdasenseError;
use thiserror::Error;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised while generating data or running a simulation
#[derive(Error, Debug)]
pub enum SimError {
    /// Failure inside the sampling or codec library
    #[error("AdaSense error: {0}")]
    Adasense(#[from] AdasenseError),

    /// A signal pattern has parameters no distribution accepts
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Class feature count does not match the others
    #[error("Class '{label}' has {actual} features, expected {expected}")]
    FeatureMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },

    /// Dataset sequences are not the length the policy was built for
    #[error("Policy expects sequences of length {expected}, dataset has {actual}")]
    SequenceLength { expected: usize, actual: usize },

    /// No classes were given
    #[error("Dataset needs at least one class")]
    NoClasses,

    /// Report serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Report output failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

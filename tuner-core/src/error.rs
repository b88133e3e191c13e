//! Error types for the tuner core.

use thiserror::Error;

pub type TunerResult<T> = Result<T, TunerError>;

#[derive(Debug, Error)]
pub enum TunerError {
    /// A non-positive or non-finite frequency reached the classifier.
    #[error("Invalid frequency: {0} Hz (must be finite and > 0)")]
    InvalidFrequency(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read or write configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

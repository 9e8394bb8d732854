//! Error types for the predictor.

use std::path::PathBuf;
use thiserror::Error;

/// Loading the model artifact failed. Fatal at startup.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("incompatible model artifact: {0}")]
    Incompatible(String),
}

impl ModelLoadError {
    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::Incompatible(msg.into())
    }
}

/// Any failure raised while computing a prediction.
///
/// Deliberately flat: callers only ever show the message.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct PredictionError {
    message: String,
}

impl PredictionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Submitted widget state that a browser widget would never have produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field}: '{value}' is not a valid number")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
        value: String,
    },

    #[error("{field}: '{value}' is not one of the available options")]
    UnknownOption { field: &'static str, value: String },
}

/// Malformed environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

//! Unified error types for tapbridge

use crate::provision::Stage;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Argument errors
    #[error("Invalid arguments: {0}")]
    Validation(String),

    // Device errors
    #[error("Interface '{0}' already exists")]
    AlreadyExists(String),

    #[error("Failed to {operation} on '{device}' ({command}): {stderr}")]
    CommandFailed {
        device: String,
        operation: String,
        command: String,
        stderr: String,
    },

    // Orchestrator errors
    #[error("Invalid provisioning transition: {0}")]
    InvalidTransition(String),

    /// A step failed after earlier steps already changed the host
    #[error("Provisioning {stage} after {} completed step(s): {source}", .completed.len())]
    Aborted {
        stage: Stage,
        /// Last stage reached before the failure
        reached: Stage,
        /// Steps applied before the failure, in order
        completed: Vec<String>,
        source: Box<Error>,
    },
}

impl Error {
    /// Name of the device a command failure refers to
    pub fn device(&self) -> Option<&str> {
        match self {
            Error::AlreadyExists(name) => Some(name.as_str()),
            Error::CommandFailed { device, .. } => Some(device.as_str()),
            Error::Aborted { source, .. } => source.device(),
            _ => None,
        }
    }
}

/// Result type alias for tapbridge operations
pub type Result<T> = std::result::Result<T, Error>;

//! Core error types for kegel-core.
//!
//! The timer engine itself never fails; these errors cover configuration
//! handling and the peripheral collaborators (voice, ambient sound,
//! presentation) that sit around it.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for kegel-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Collaborator failures (voice, sound, display)
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML encoding errors
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The tick driver task is gone
    #[error("tick driver has stopped")]
    DriverStopped,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Home/config directory could not be prepared
    #[error("Failed to prepare data directory {path}: {message}")]
    DataDir { path: PathBuf, message: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Phase durations must be at least one second
    #[error("'{field}' must be a positive number of seconds")]
    NonPositiveDuration { field: String },

    /// A restored engine breaks a countdown invariant
    #[error("invalid engine state: {0}")]
    InvalidState(String),
}

/// Failure reported by a peripheral collaborator.
///
/// Never reaches the engine: the dispatcher logs it and disables the
/// collaborator that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The backing device or engine is not available on this host
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    /// Writing output failed
    #[error("{collaborator} output failed: {reason}")]
    Output {
        collaborator: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn output(collaborator: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Output {
            collaborator,
            reason: err.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

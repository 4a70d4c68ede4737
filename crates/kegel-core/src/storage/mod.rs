mod config;

pub use config::{Config, DurationsConfig, MusicConfig, VoiceConfig};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/kegel[-dev]/` based on KEGEL_ENV.
///
/// Set KEGEL_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("KEGEL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("kegel-dev")
    } else {
        base_dir.join("kegel")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

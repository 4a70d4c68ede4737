//! TOML-based application configuration.
//!
//! Stores user preferences:
//! - Contract/relax phase durations
//! - Voice cue toggle and locale
//! - Ambient music toggle and volume
//!
//! Configuration is stored at `~/.config/kegel/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, Result, ValidationError};
use crate::notify::Locale;
use crate::timer::PhaseDurations;

/// Phase durations in seconds, as written by the user.
///
/// Kept unvalidated so a bad file still loads; [`Config::durations`] applies
/// the fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationsConfig {
    #[serde(default = "default_contract_secs")]
    pub contract_secs: u32,
    #[serde(default = "default_relax_secs")]
    pub relax_secs: u32,
}

/// Spoken cue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub locale: Locale,
}

/// Ambient background music configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Percentage, 0-100.
    #[serde(default = "default_volume")]
    pub volume: u8,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/kegel/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub durations: DurationsConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub music: MusicConfig,
}

// Default functions
fn default_contract_secs() -> u32 {
    3
}
fn default_relax_secs() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_volume() -> u8 {
    30
}

impl Default for DurationsConfig {
    fn default() -> Self {
        Self {
            contract_secs: default_contract_secs(),
            relax_secs: default_relax_secs(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: Locale::default(),
        }
    }
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: default_volume(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) => {
                        return Err(invalid("cannot replace a whole section".into()))
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or it would make a phase duration zero. The config is left unchanged
    /// on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let mut updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        let written = match key {
            "durations.contract_secs" => Some(("contract_secs", updated.durations.contract_secs)),
            "durations.relax_secs" => Some(("relax_secs", updated.durations.relax_secs)),
            _ => None,
        };
        if let Some((field, 0)) = written {
            return Err(ValidationError::NonPositiveDuration {
                field: field.into(),
            }
            .into());
        }
        updated.music.volume = updated.music.volume.min(100);
        *self = updated;
        Ok(())
    }

    /// Validated phase durations, falling back to the defaults when the stored
    /// values are not positive.
    pub fn durations(&self) -> PhaseDurations {
        PhaseDurations::new(self.durations.contract_secs, self.durations.relax_secs)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid phase durations in config, using defaults");
                PhaseDurations::default()
            })
    }

    /// Music volume clamped to 0-100.
    pub fn volume(&self) -> u8 {
        self.music.volume.min(100)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            Self::default()
        })
    }
}

//! Nudge configuration system.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NudgeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub looper: LooperConfig,
}

impl NudgeConfig {
    /// Load config from the default path (~/.nudge/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NudgeError::Config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| NudgeError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| NudgeError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// The Nudge home directory (~/.nudge).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nudge")
    }
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    NudgeConfig::home_dir().join("nudge.db").display().to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

/// Reminder scheduler options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Re-arm pending reminders from the store at startup.
    #[serde(default = "bool_true")]
    pub restore_on_start: bool,
}

fn bool_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { restore_on_start: true }
    }
}

/// Webhook loop options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LooperConfig {
    /// Base URL that endpoint id/token pairs are appended to.
    #[serde(default = "default_endpoint_base")]
    pub endpoint_base: String,
    /// Fixed per-request timeout for endpoint POSTs.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint_base() -> String {
    "https://discord.com/api/webhooks".into()
}

fn default_request_timeout() -> u64 {
    5
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            endpoint_base: default_endpoint_base(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

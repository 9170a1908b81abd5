//! Application configuration management.
//!
//! This module handles loading and saving the client configuration,
//! which includes the service base URL and the last used account email.
//!
//! Configuration is stored at `~/.config/outpost/config.json`. The
//! per-user state directory (credential record, logs) lives under the
//! platform data directory.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/state directory paths
const APP_NAME: &str = "outpost";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default service endpoint when neither config nor env override it
pub const DEFAULT_BASE_URL: &str = "https://api.outpost.dev";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Resolve the service base URL. `OUTPOST_BASE_URL` wins over the
    /// config file, which wins over the built-in default.
    pub fn base_url(&self) -> String {
        std::env::var("OUTPOST_BASE_URL")
            .ok()
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for durable client state: the credential record and logs.
    pub fn state_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

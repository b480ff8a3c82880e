use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{LocalSlots, StorageError};

pub const DEFAULT_ASSIST_MODEL: &str = "gemini-3-flash-preview";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Settings read from `<data dir>/config.toml`, overridden by the environment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where local slots live; defaults to the platform data dir
    pub data_dir: Option<PathBuf>,
    pub backend: BackendConfig,
    pub assist: AssistConfig,
}

/// Cloud backend project (auth, tables, storage)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl BackendConfig {
    /// URL and key, when both are present and non-blank
    pub fn credentials(&self) -> Option<(String, String)> {
        let url = self.url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let key = self.anon_key.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((url.to_string(), key.to_string()))
    }
}

/// Generative-text helper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistConfig {
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_ASSIST_MODEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load `config.toml` from the data dir (if any), then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = match env_var("MEMORY_LANE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => LocalSlots::default_data_dir()?,
        };
        let mut config = Self::from_file(&data_dir.join("config.toml"))?;
        config.data_dir.get_or_insert(data_dir);
        config.apply_env(env_var);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Overlay values from `lookup` (the process environment outside tests)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("MEMORY_LANE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup("SUPABASE_URL") {
            self.backend.url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            self.backend.anon_key = Some(key);
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.assist.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.assist.model = model;
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(LocalSlots::default_data_dir()?),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

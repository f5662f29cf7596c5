//! Client configuration.
//!
//! Read from a JSON file, then overridden by environment variables. The CLI
//! applies its own flags last.

use crate::stroke::BoardId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding [`ClientConfig::server_url`].
pub const SERVER_URL_ENV: &str = "STROKEBOARD_SERVER_URL";
/// Environment variable overriding [`ClientConfig::board_id`].
pub const BOARD_ENV: &str = "STROKEBOARD_BOARD";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the authority.
    pub server_url: String,
    /// Board this client draws on.
    pub board_id: BoardId,
    /// Minimum distance between captured points.
    pub min_point_spacing: f32,
    pub default_color: String,
    pub default_thickness: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:3030/ws".to_string(),
            board_id: BoardId(1),
            min_point_spacing: 2.0,
            default_color: "#000000".to_string(),
            default_thickness: 4.0,
        }
    }
}

impl ClientConfig {
    /// Default config file location: `<config dir>/strokeboard/client.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("strokeboard").join("client.json"))
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path` if given, otherwise from the default location when a
    /// file exists there, otherwise defaults. Environment overrides apply in
    /// every case.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => {
                    log::debug!("Loading config from {}", path.display());
                    Self::from_file(&path)?
                }
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(url) = lookup(SERVER_URL_ENV) {
            self.server_url = url;
        }
        if let Some(board) = lookup(BOARD_ENV) {
            let id = board.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: BOARD_ENV.to_string(),
                value: board.clone(),
            })?;
            self.board_id = BoardId(id);
        }
        Ok(())
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}

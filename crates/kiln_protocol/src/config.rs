//! Server configuration for credential and config resolution.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::defaults::{
    DEFAULT_CONFIG_PATHS, DEFAULT_EXTENSION_TIMEOUT_SECS, DEFAULT_FORGE_TIMEOUT_SECS,
};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Canonical server configuration. Every field has a default so a missing
/// or partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Secret extension endpoint. Empty disables it.
    pub secret_extension_endpoint: String,
    /// Registry extension endpoint. Empty disables it.
    pub registry_extension_endpoint: String,
    /// Config extension endpoint. Empty disables it.
    pub config_extension_endpoint: String,
    pub extension_timeout_secs: u64,
    /// Deadline for a single forge fetch attempt.
    pub forge_timeout_secs: u64,
    /// Docker client config exposing read-only global registries.
    pub docker_config_path: Option<PathBuf>,
    /// Pipeline config locations tried when a repo sets none.
    pub config_paths: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            secret_extension_endpoint: String::new(),
            registry_extension_endpoint: String::new(),
            config_extension_endpoint: String::new(),
            extension_timeout_secs: DEFAULT_EXTENSION_TIMEOUT_SECS,
            forge_timeout_secs: DEFAULT_FORGE_TIMEOUT_SECS,
            docker_config_path: None,
            config_paths: DEFAULT_CONFIG_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigLoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&raw).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn extension_timeout(&self) -> Duration {
        Duration::from_secs(self.extension_timeout_secs.max(1))
    }

    pub fn forge_timeout(&self) -> Duration {
        Duration::from_secs(self.forge_timeout_secs.max(1))
    }
}

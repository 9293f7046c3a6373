//! Error types for pipeline config retrieval.

use kiln_security::HttpError;
use kiln_store::Interrupted;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a forge client.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("{path} not found")]
    NotFound { path: String },

    #[error("Forge request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl ForgeError {
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Every candidate path was absent or empty.
    #[error("No pipeline config found for {repo} (tried {tried:?})")]
    NotFound { repo: String, tried: Vec<String> },

    #[error("Forge error: {0}")]
    Forge(#[source] ForgeError),

    /// A single attempt ran past its own deadline.
    #[error("Config fetch attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled or its deadline passed.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("Config extension {endpoint} failed: {source}")]
    Extension {
        endpoint: String,
        #[source]
        source: HttpError,
    },
}

impl From<ForgeError> for ConfigError {
    fn from(err: ForgeError) -> Self {
        match err {
            ForgeError::Interrupted(i) => Self::Interrupted(i),
            other => Self::Forge(other),
        }
    }
}

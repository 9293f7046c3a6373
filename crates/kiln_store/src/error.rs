//! Error types for the store layer.

use thiserror::Error;

use crate::context::Interrupted;

/// Store operation result type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record absent for the given scope and key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique (scope, key) or record name already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Backend failure (connection, lock poisoning, etc.)
    #[error("Store backend error: {0}")]
    Backend(String),

    /// IO error (file backed stores)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller cancelled or its deadline passed
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an already exists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

//! Error types for credential catalogs and extensions.

use kiln_protocol::{CredentialKind, Origin, Scope, ValidationError};
use kiln_security::HttpError;
use kiln_store::{Interrupted, StoreError};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors surfaced by catalogs and read-only sources.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} '{key}' not found in {scope}")]
    NotFound {
        kind: CredentialKind,
        key: String,
        scope: Scope,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Mutation attempted on an entry that did not come from the Store.
    #[error("{kind} '{key}' is read-only ({origin})")]
    ReadOnly {
        kind: CredentialKind,
        key: String,
        origin: Origin,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store failure, passed through unchanged.
    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl CatalogError {
    pub fn not_found(kind: CredentialKind, scope: Scope, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
            scope,
        }
    }

    /// True for catalog misses and Store misses alike.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Interrupted(i) => Self::Interrupted(i),
            other => Self::Store(other),
        }
    }
}

/// Failure talking to an extension. Recovered by the callers that merge
/// extension output into base results.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension {endpoint} failed: {source}")]
    Call {
        endpoint: String,
        #[source]
        source: HttpError,
    },

    #[error("Extension {endpoint} returned malformed '{field}': {source}")]
    Decode {
        endpoint: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ExtensionError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Call { endpoint, .. } | Self::Decode { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status of a non-2xx answer, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Call { source, .. } => source.status(),
            Self::Decode { .. } => None,
        }
    }

    /// The caller cancelled the request. A passed deadline is an ordinary
    /// call failure, like a client timeout.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Call {
                source: HttpError::Interrupted(Interrupted::Cancelled),
                ..
            }
        )
    }
}

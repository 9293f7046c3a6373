use kiln_store::{Interrupted, StoreError};
use thiserror::Error;

/// Failure to establish the server signing identity. Fatal at startup.
#[derive(Debug, Error)]
pub enum SigningKeyError {
    #[error("Signing key store error: {0}")]
    Store(#[source] StoreError),

    #[error("Stored signing key is malformed: {0}")]
    Decode(String),

    #[error("Failed to encode public key: {0}")]
    Encode(String),
}

/// Failure of a signed HTTP call.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-200 answer. `body` is the raw diagnostic text from the remote.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::Transport(err)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureVerifyError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Malformed {header}: {reason}")]
    Malformed { header: &'static str, reason: String },

    #[error("Content digest does not match body")]
    DigestMismatch,

    #[error("Signature does not verify")]
    BadSignature,
}

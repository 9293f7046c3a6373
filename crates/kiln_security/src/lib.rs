//! Kiln Security Module
//!
//! Provides:
//! - **Keys**: the server's Ed25519 signing identity ([`SignatureKeyManager`])
//! - **HTTP signatures**: signing and verification of extension requests
//! - **Signed client**: JSON request/response helper used by extensions
//! - **Digest**: SHA256 helpers for fingerprints and content digests

pub mod client;
pub mod digest;
mod error;
pub mod http_signature;
pub mod keys;

pub use client::SignedClient;
pub use digest::{content_digest, sha256};
pub use error::{HttpError, SignatureVerifyError, SigningKeyError};
pub use http_signature::{sign_request, verify_request, SignatureHeaders, SignedRequest};
pub use keys::{SignatureKeyManager, SigningKeys};
pub use reqwest::Method;

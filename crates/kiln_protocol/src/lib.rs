//! Kiln shared domain types.
//!
//! Everything that crosses a crate boundary during credential and config
//! resolution lives here:
//!
//! - **types**: repositories, pipelines, webhook events, config files
//! - **credential**: scopes, origins, the [`Credential`] capability, secrets
//!   and registry logins
//! - **extension**: JSON envelopes exchanged with extension endpoints
//! - **config**: [`ServerConfig`] and its TOML loader

pub mod config;
pub mod credential;
pub mod defaults;
pub mod extension;
pub mod types;

pub use config::{ConfigLoadError, ServerConfig};
pub use credential::{
    Credential, CredentialKind, ListOptions, Origin, Registry, Scope, ScopeLevel, Secret,
    ValidationError,
};
pub use extension::{ConfigRequest, ConfigResponse, PipelineRequest};
pub use types::{ConfigFile, OrgId, Pipeline, Repo, RepoId, WebhookEvent};

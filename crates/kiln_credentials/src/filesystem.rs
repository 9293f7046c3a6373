//! Registry logins read from a Docker client config file.
//!
//! ```json
//! {
//!   "auths": { "reg.example.com": { "auth": "dXNlcjpwYXNz" } },
//!   "credHelpers": { "123.dkr.ecr.us-east-1.amazonaws.com": "ecr-login" }
//! }
//! ```
//!
//! The file is optional. A missing file yields no entries; a malformed one
//! fails as a whole.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kiln_protocol::{Credential, Origin, Registry, Scope, ValidationError};
use kiln_store::{Interrupted, RequestContext};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::combined::ReadOnlySource;
use crate::error::{CatalogError, Result};

#[derive(Default, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
    #[serde(default, rename = "credHelpers")]
    cred_helpers: BTreeMap<String, String>,
}

#[derive(Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default, rename = "serverAddress")]
    server_address: String,
}

/// Username and secret returned by a credential helper.
#[derive(Clone, Deserialize)]
pub struct HelperCredentials {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Secret")]
    pub secret: String,
}

impl fmt::Debug for HelperCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} printed unreadable output: {source}")]
    Decode {
        program: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Resolves a host through a named external credential helper.
#[async_trait]
pub trait CredentialHelper: Send + Sync {
    async fn get(
        &self,
        ctx: &RequestContext,
        helper: &str,
        server: &str,
    ) -> std::result::Result<HelperCredentials, HelperError>;
}

/// Runs `docker-credential-<helper> get` with the host on stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCredentialHelper;

#[async_trait]
impl CredentialHelper for ProcessCredentialHelper {
    async fn get(
        &self,
        ctx: &RequestContext,
        helper: &str,
        server: &str,
    ) -> std::result::Result<HelperCredentials, HelperError> {
        let program = format!("docker-credential-{}", helper);
        let spawn_error = |source| HelperError::Spawn {
            program: program.clone(),
            source,
        };

        let mut child = Command::new(&program)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(server.as_bytes()).await.map_err(spawn_error)?;
        }

        let output = ctx
            .run(child.wait_with_output())
            .await?
            .map_err(spawn_error)?;
        if !output.status.success() {
            return Err(HelperError::Failed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(|source| HelperError::Decode { program, source })
    }
}

/// Decode `base64("user:pass")`.
fn decode_auth(host: &str, auth: &str) -> std::result::Result<(String, String), ValidationError> {
    let field = format!("auths.{}.auth", host);
    let raw = STANDARD
        .decode(auth.trim())
        .map_err(|e| ValidationError::invalid(field.as_str(), format!("not valid base64: {}", e)))?;
    let decoded = String::from_utf8(raw)
        .map_err(|_| ValidationError::invalid(field.as_str(), "not valid UTF-8"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| ValidationError::invalid(field.as_str(), "expected 'username:password'"))?;
    Ok((username.to_string(), password.to_string()))
}

fn read_only_registry(address: &str, username: String, password: String) -> Registry {
    let mut registry = Registry::new(Scope::Global, &Registry::normalize_address(address), "", "");
    registry.username = username;
    registry.password = password;
    registry.mark_read_only(Origin::Filesystem);
    registry
}

/// Parse a Docker client config into read-only Global registries, sorted by
/// address. Helper entries override `auths` entries for the same host.
pub async fn parse_docker_config(
    ctx: &RequestContext,
    data: &[u8],
    helper: &dyn CredentialHelper,
) -> Result<Vec<Registry>> {
    let config: DockerConfigFile = serde_json::from_slice(data)
        .map_err(|e| ValidationError::invalid("docker config", e.to_string()))?;

    let mut registries: BTreeMap<String, Registry> = BTreeMap::new();
    for (host, entry) in &config.auths {
        let address = if entry.server_address.is_empty() {
            host.as_str()
        } else {
            entry.server_address.as_str()
        };
        let (username, password) = if !entry.username.is_empty() && !entry.password.is_empty() {
            (entry.username.clone(), entry.password.clone())
        } else if !entry.auth.is_empty() {
            decode_auth(host, &entry.auth)?
        } else {
            // Placeholder entries written alongside a credential store.
            continue;
        };
        let registry = read_only_registry(address, username, password);
        registries.insert(registry.address.clone(), registry);
    }

    for (host, name) in &config.cred_helpers {
        let creds = helper.get(ctx, name, host).await.map_err(|e| match e {
            HelperError::Interrupted(i) => CatalogError::Interrupted(i),
            other => ValidationError::invalid(format!("credHelpers.{}", host), other.to_string()).into(),
        })?;
        let registry = read_only_registry(host, creds.username, creds.secret);
        registries.insert(registry.address.clone(), registry);
    }

    for registry in registries.values() {
        registry.validate_address()?;
    }
    Ok(registries.into_values().collect())
}

/// Read-only registry source backed by a Docker config file on disk.
pub struct DockerConfigSource {
    path: PathBuf,
    helper: Arc<dyn CredentialHelper>,
}

impl DockerConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_helper(path, Arc::new(ProcessCredentialHelper))
    }

    pub fn with_helper(path: impl Into<PathBuf>, helper: Arc<dyn CredentialHelper>) -> Self {
        Self {
            path: path.into(),
            helper,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReadOnlySource<Registry> for DockerConfigSource {
    fn name(&self) -> &str {
        "docker-config"
    }

    async fn list(&self, ctx: &RequestContext) -> Result<Vec<Registry>> {
        let data = match ctx.run(tokio::fs::read(&self.path)).await? {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No docker config file, skipping");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        parse_docker_config(ctx, &data, self.helper.as_ref()).await
    }
}

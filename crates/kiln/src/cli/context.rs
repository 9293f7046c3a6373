//! Shared setup for subcommands: home directory, server config, stores and
//! the composed services.

use anyhow::{Context, Result};
use kiln::{Services, Stores};
use kiln_protocol::defaults::DEFAULT_CONFIG_FILE;
use kiln_protocol::ServerConfig;
use kiln_store::{FileConfigStore, MemoryStore, RequestContext, StoreSeed};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Options every subcommand accepts.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub seed: Option<PathBuf>,
    pub secret_extension: Option<String>,
    pub registry_extension: Option<String>,
    pub config_extension: Option<String>,
    pub docker_config: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn home(&self) -> Result<PathBuf> {
        match &self.home {
            Some(home) => Ok(home.clone()),
            None => kiln_logging::kiln_home(),
        }
    }

    /// Config file contents with command-line overrides applied.
    pub fn server_config(&self, home: &Path) -> Result<ServerConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| home.join(DEFAULT_CONFIG_FILE));
        let mut config = ServerConfig::load(&path)?;
        debug!(path = %path.display(), "Loaded server config");

        if let Some(endpoint) = &self.secret_extension {
            config.secret_extension_endpoint = endpoint.clone();
        }
        if let Some(endpoint) = &self.registry_extension {
            config.registry_extension_endpoint = endpoint.clone();
        }
        if let Some(endpoint) = &self.config_extension {
            config.config_extension_endpoint = endpoint.clone();
        }
        if let Some(path) = &self.docker_config {
            config.docker_config_path = Some(path.clone());
        }
        Ok(config)
    }

    /// Stores for this invocation: the seed (if any) in memory, and the
    /// signing key persisted under `home`.
    pub fn stores(&self, home: &Path) -> Result<Stores> {
        let store = match &self.seed {
            Some(path) => {
                let seed = StoreSeed::load(path)
                    .with_context(|| format!("Failed to load seed {}", path.display()))?;
                info!(
                    path = %path.display(),
                    secrets = seed.secrets.len(),
                    registries = seed.registries.len(),
                    "Loaded store seed"
                );
                MemoryStore::from_seed(seed)?
            }
            None => MemoryStore::new(),
        };
        let server_config = FileConfigStore::new(home.join("server-config"));
        Ok(Stores::memory(Arc::new(store)).with_server_config(Arc::new(server_config)))
    }

    pub async fn services(&self, ctx: &RequestContext) -> Result<Services> {
        let home = self.home()?;
        let config = self.server_config(&home)?;
        let stores = self.stores(&home)?;
        Services::build(ctx, &config, stores).await
    }
}

/// Context cancelled on Ctrl-C.
pub fn interruptible() -> RequestContext {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    RequestContext::with_cancellation(cancel)
}

/// Parse `arg` as inline JSON when it starts with `{`, else as a path to a
/// JSON file.
pub fn load_json<T: DeserializeOwned>(arg: &str, what: &str) -> Result<T> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).with_context(|| format!("Invalid {} JSON", what));
    }
    let raw = std::fs::read_to_string(arg)
        .with_context(|| format!("Failed to read {} file {}", what, arg))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid {} JSON in {}", what, arg))
}

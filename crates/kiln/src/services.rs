//! Composition root: wires Stores, signing key and extensions into the
//! credential stacks and the config fetcher.

use anyhow::{Context, Result};
use kiln_credentials::{
    Catalog, CombinedCatalog, CredentialService, DockerConfigSource, ExtendedCatalog,
    HttpExtension, ReadOnlySource,
};
use kiln_pipeline_config::{ConfigExtension, ConfigFetcher, Forge, HttpConfigExtension};
use kiln_protocol::{Registry, Secret, ServerConfig};
use kiln_security::{SignatureKeyManager, SignedClient, SigningKeys};
use kiln_store::{CredentialStore, MemoryStore, RequestContext, ServerConfigStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Persistence collaborators handed to [`Services::build`].
#[derive(Clone)]
pub struct Stores {
    pub secrets: Arc<dyn CredentialStore<Secret>>,
    pub registries: Arc<dyn CredentialStore<Registry>>,
    pub server_config: Arc<dyn ServerConfigStore>,
}

impl Stores {
    /// Every table backed by one in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            secrets: store.clone(),
            registries: store.clone(),
            server_config: store,
        }
    }

    /// Credentials from `store`, server records (the signing key) elsewhere.
    pub fn with_server_config(mut self, server_config: Arc<dyn ServerConfigStore>) -> Self {
        self.server_config = server_config;
        self
    }
}

pub struct Services {
    keys: Arc<SigningKeys>,
    secrets: Arc<dyn CredentialService<Secret>>,
    registries: Arc<dyn CredentialService<Registry>>,
    config_extension: Option<Arc<dyn ConfigExtension>>,
    forge_timeout: Duration,
    config_paths: Vec<String>,
}

impl Services {
    /// Build every service for `config`.
    ///
    /// The signing key is loaded (or created) here, so a broken key record
    /// fails startup instead of the first extension call.
    pub async fn build(ctx: &RequestContext, config: &ServerConfig, stores: Stores) -> Result<Self> {
        let keys = SignatureKeyManager::new(stores.server_config)
            .keys(ctx)
            .await
            .context("Failed to load server signing key")?;
        let client = SignedClient::new(Arc::clone(&keys), config.extension_timeout())
            .context("Failed to build extension HTTP client")?;

        let mut secrets: Arc<dyn CredentialService<Secret>> =
            Arc::new(Catalog::<Secret>::new(stores.secrets));
        if let Some(endpoint) = configured(&config.secret_extension_endpoint) {
            info!(endpoint, "Secret extension enabled");
            let extension = HttpExtension::<Secret>::new(endpoint, client.clone());
            secrets = Arc::new(ExtendedCatalog::<Secret>::new(secrets, Arc::new(extension)));
        }

        let mut registries: Arc<dyn CredentialService<Registry>> =
            Arc::new(Catalog::<Registry>::new(stores.registries));
        if let Some(path) = &config.docker_config_path {
            info!(path = %path.display(), "Docker config registries enabled");
            let source: Arc<dyn ReadOnlySource<Registry>> =
                Arc::new(DockerConfigSource::new(path.clone()));
            registries = Arc::new(CombinedCatalog::<Registry>::new(registries, vec![source]));
        }
        if let Some(endpoint) = configured(&config.registry_extension_endpoint) {
            info!(endpoint, "Registry extension enabled");
            let extension = HttpExtension::<Registry>::new(endpoint, client.clone());
            registries = Arc::new(ExtendedCatalog::<Registry>::new(registries, Arc::new(extension)));
        }

        let config_extension = configured(&config.config_extension_endpoint).map(|endpoint| {
            info!(endpoint, "Config extension enabled");
            Arc::new(HttpConfigExtension::new(endpoint, client.clone())) as Arc<dyn ConfigExtension>
        });

        Ok(Self {
            keys,
            secrets,
            registries,
            config_extension,
            forge_timeout: config.forge_timeout(),
            config_paths: config.config_paths.clone(),
        })
    }

    pub fn keys(&self) -> &Arc<SigningKeys> {
        &self.keys
    }

    pub fn secrets(&self) -> Arc<dyn CredentialService<Secret>> {
        Arc::clone(&self.secrets)
    }

    pub fn registries(&self) -> Arc<dyn CredentialService<Registry>> {
        Arc::clone(&self.registries)
    }

    /// Fetcher reading from `forge`, with the configured extension and paths.
    pub fn config_fetcher(&self, forge: Arc<dyn Forge>) -> ConfigFetcher {
        let fetcher = ConfigFetcher::new(forge)
            .with_attempt_timeout(self.forge_timeout)
            .with_default_paths(self.config_paths.clone());
        match &self.config_extension {
            Some(extension) => fetcher.with_extension(Arc::clone(extension)),
            None => fetcher,
        }
    }
}

fn configured(endpoint: &str) -> Option<&str> {
    let endpoint = endpoint.trim();
    (!endpoint.is_empty()).then_some(endpoint)
}

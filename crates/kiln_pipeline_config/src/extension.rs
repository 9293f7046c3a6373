//! Config extension: lets an operator service rewrite the fetched file set.

use async_trait::async_trait;
use kiln_protocol::{ConfigFile, ConfigRequest, ConfigResponse, Pipeline, Repo};
use kiln_security::{HttpError, Method, SignedClient};
use kiln_store::{Interrupted, RequestContext};
use tracing::debug;

use crate::error::ConfigError;

#[async_trait]
pub trait ConfigExtension: Send + Sync {
    fn endpoint(&self) -> &str;

    /// Replacement file set, or `None` to keep `current`.
    ///
    /// Only caller cancellation is reported as `ConfigError::Interrupted`;
    /// a passed deadline is an extension failure.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
        current: &[ConfigFile],
    ) -> Result<Option<Vec<ConfigFile>>, ConfigError>;
}

/// Config extension reached with a signed `POST`.
pub struct HttpConfigExtension {
    endpoint: String,
    client: SignedClient,
}

impl HttpConfigExtension {
    pub fn new(endpoint: impl Into<String>, client: SignedClient) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

#[async_trait]
impl ConfigExtension for HttpConfigExtension {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
        current: &[ConfigFile],
    ) -> Result<Option<Vec<ConfigFile>>, ConfigError> {
        if !self.is_configured() {
            return Ok(None);
        }
        let request = ConfigRequest {
            repo: repo.clone(),
            pipeline: pipeline.clone(),
            configs: current.to_vec(),
        };
        match self
            .client
            .send::<_, ConfigResponse>(ctx, Method::POST, &self.endpoint, Some(&request))
            .await
        {
            Ok(response) => {
                debug!(endpoint = %self.endpoint, files = response.configs.len(), "Config extension replaced configs");
                Ok(Some(response.configs))
            }
            Err(HttpError::Status { status: 204, .. }) => Ok(None),
            Err(HttpError::Interrupted(Interrupted::Cancelled)) => {
                Err(ConfigError::Interrupted(Interrupted::Cancelled))
            }
            Err(source) => Err(ConfigError::Extension {
                endpoint: self.endpoint.clone(),
                source,
            }),
        }
    }
}

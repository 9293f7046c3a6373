//! Extension transports contributing credentials at pipeline time.

use async_trait::async_trait;
use kiln_protocol::{Credential, Origin, Pipeline, PipelineRequest, Repo, Scope};
use kiln_security::{HttpError, Method, SignedClient};
use kiln_store::RequestContext;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::debug;

use crate::error::ExtensionError;

/// Read-only donor of pipeline-time credentials. Transports (signed HTTP,
/// out-of-process plugins) implement this and are picked at startup.
#[async_trait]
pub trait CredentialExtension<T: Credential>: Send + Sync {
    /// Where the extension lives, for logs.
    fn endpoint(&self) -> &str;

    async fn list_for_pipeline(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<T>, ExtensionError>;
}

/// Extension reached with signed `POST` requests.
///
/// The answer is `{"<kind plural>": [...]}` on `200`; `204` means the
/// extension has nothing to add.
pub struct HttpExtension<T> {
    endpoint: String,
    client: SignedClient,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Credential> HttpExtension<T> {
    pub fn new(endpoint: impl Into<String>, client: SignedClient) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            _kind: PhantomData,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    fn decode(&self, mut body: Value, repo: &Repo) -> Result<Vec<T>, ExtensionError> {
        let field = T::KIND.plural();
        let items = match body.get_mut(field) {
            Some(items) => items.take(),
            None => return Ok(Vec::new()),
        };
        let mut entries: Vec<T> =
            serde_json::from_value(items).map_err(|source| ExtensionError::Decode {
                endpoint: self.endpoint.clone(),
                field,
                source,
            })?;
        for entry in &mut entries {
            entry.set_scope(Scope::Repository(repo.id));
            entry.mark_read_only(Origin::Extension);
        }
        Ok(entries)
    }
}

#[async_trait]
impl<T: Credential> CredentialExtension<T> for HttpExtension<T> {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn list_for_pipeline(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<T>, ExtensionError> {
        if !self.is_configured() {
            return Ok(Vec::new());
        }
        let request = PipelineRequest {
            repo: repo.clone(),
            pipeline: pipeline.clone(),
        };
        let body: Value = match self
            .client
            .send(ctx, Method::POST, &self.endpoint, Some(&request))
            .await
        {
            Ok(body) => body,
            Err(HttpError::Status { status: 204, .. }) => {
                debug!(kind = %T::KIND, endpoint = %self.endpoint, "Extension has nothing to add");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ExtensionError::Call {
                    endpoint: self.endpoint.clone(),
                    source,
                })
            }
        };

        let entries = self.decode(body, repo)?;
        debug!(
            kind = %T::KIND,
            endpoint = %self.endpoint,
            repo = %repo.full_name,
            count = entries.len(),
            "Extension contributed credentials"
        );
        Ok(entries)
    }
}

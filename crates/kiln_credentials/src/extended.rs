//! Base catalog plus an extension that outranks it at pipeline time.

use async_trait::async_trait;
use kiln_protocol::{Credential, ListOptions, Pipeline, Repo, Scope};
use kiln_store::{Interrupted, RequestContext};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{append_missing, CredentialService};
use crate::error::{CatalogError, Result};
use crate::extension::CredentialExtension;

/// Overrides `list_for_pipeline` only. Every other operation forwards to
/// `base` unchanged.
pub struct ExtendedCatalog<T: Credential> {
    base: Arc<dyn CredentialService<T>>,
    extension: Arc<dyn CredentialExtension<T>>,
}

impl<T: Credential> ExtendedCatalog<T> {
    pub fn new(base: Arc<dyn CredentialService<T>>, extension: Arc<dyn CredentialExtension<T>>) -> Self {
        Self { base, extension }
    }
}

#[async_trait]
impl<T: Credential> CredentialService<T> for ExtendedCatalog<T> {
    async fn find(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<T> {
        self.base.find(ctx, scope, key).await
    }

    async fn list(&self, ctx: &RequestContext, scope: Scope, opts: ListOptions) -> Result<Vec<T>> {
        self.base.list(ctx, scope, opts).await
    }

    async fn list_for_pipeline(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<T>> {
        let (base, extended) = tokio::join!(
            self.base.list_for_pipeline(ctx, repo, pipeline),
            self.extension.list_for_pipeline(ctx, repo, pipeline),
        );
        let base = base?;

        let extended = match extended {
            Ok(entries) => entries,
            Err(e) => {
                if e.is_cancelled() {
                    return Err(CatalogError::Interrupted(Interrupted::Cancelled));
                }
                warn!(
                    kind = %T::KIND,
                    repo = %repo.full_name,
                    endpoint = %e.endpoint(),
                    status = ?e.status(),
                    error = %e,
                    "Extension unavailable, using stored credentials only"
                );
                return Ok(base);
            }
        };
        if extended.is_empty() {
            return Ok(base);
        }

        debug!(
            kind = %T::KIND,
            repo = %repo.full_name,
            extension = extended.len(),
            base = base.len(),
            "Merging extension credentials"
        );
        // An extension may repeat a key; its first entry wins.
        let extended = append_missing(Vec::new(), extended);
        Ok(append_missing(extended, base))
    }

    async fn create(&self, ctx: &RequestContext, scope: Scope, item: T) -> Result<T> {
        self.base.create(ctx, scope, item).await
    }

    async fn update(&self, ctx: &RequestContext, scope: Scope, item: T) -> Result<T> {
        self.base.update(ctx, scope, item).await
    }

    async fn delete(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<()> {
        self.base.delete(ctx, scope, key).await
    }
}

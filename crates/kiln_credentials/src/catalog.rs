//! Store-backed catalog and the pipeline-time priority merge.

use async_trait::async_trait;
use kiln_protocol::{Credential, ListOptions, Pipeline, Repo, Scope, ScopeLevel};
use kiln_store::{CredentialStore, RequestContext};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CatalogError, Result};

/// Resolution and administration surface for one credential type.
///
/// Implemented by [`Catalog`] and by the wrappers layered on top of it
/// ([`crate::CombinedCatalog`], [`crate::ExtendedCatalog`]).
#[async_trait]
pub trait CredentialService<T: Credential>: Send + Sync {
    async fn find(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<T>;

    async fn list(&self, ctx: &RequestContext, scope: Scope, opts: ListOptions) -> Result<Vec<T>>;

    /// Deduplicated, priority-ordered entries for one running pipeline.
    async fn list_for_pipeline(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<T>>;

    async fn create(&self, ctx: &RequestContext, scope: Scope, item: T) -> Result<T>;

    async fn update(&self, ctx: &RequestContext, scope: Scope, item: T) -> Result<T>;

    async fn delete(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<()>;
}

/// Keep the first entry per key, walking scope levels from Repository to
/// Global. Within a level, `entries` order is preserved.
pub fn merge_by_priority<T: Credential>(entries: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(entries.len());
    for level in ScopeLevel::PRIORITY {
        for entry in entries.iter().filter(|e| e.scope().level() == level) {
            if seen.insert(entry.key().to_string()) {
                merged.push(entry.clone());
            }
        }
    }
    merged
}

/// Append `extra` entries whose keys are not already in `base`.
pub(crate) fn append_missing<T: Credential>(mut base: Vec<T>, extra: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<String> = base.iter().map(|e| e.key().to_string()).collect();
    for entry in extra {
        if seen.insert(entry.key().to_string()) {
            base.push(entry);
        }
    }
    base
}

/// Scoped CRUD over a [`CredentialStore`], plus the priority merge.
pub struct Catalog<T: Credential> {
    store: Arc<dyn CredentialStore<T>>,
}

impl<T: Credential> Catalog<T> {
    pub fn new(store: Arc<dyn CredentialStore<T>>) -> Self {
        Self { store }
    }

    fn prepare(scope: Scope, mut item: T) -> Result<T> {
        if item.read_only() {
            return Err(CatalogError::ReadOnly {
                kind: T::KIND,
                key: item.key().to_string(),
                origin: item.origin(),
            });
        }
        item.set_scope(scope);
        item.validate()?;
        Ok(item)
    }
}

#[async_trait]
impl<T: Credential> CredentialService<T> for Catalog<T> {
    async fn find(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<T> {
        self.store.find(ctx, scope, key).await.map_err(|e| {
            if e.is_not_found() {
                CatalogError::not_found(T::KIND, scope, key)
            } else {
                e.into()
            }
        })
    }

    async fn list(&self, ctx: &RequestContext, scope: Scope, opts: ListOptions) -> Result<Vec<T>> {
        Ok(self.store.list(ctx, scope, opts).await?)
    }

    async fn list_for_pipeline(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<T>> {
        let all = self.store.list_for_repo(ctx, repo).await?;
        let fetched = all.len();
        let merged = merge_by_priority(all);
        debug!(
            kind = %T::KIND,
            repo = %repo.full_name,
            pipeline = pipeline.number,
            fetched,
            resolved = merged.len(),
            "Merged stored credentials"
        );
        Ok(merged)
    }

    async fn create(&self, ctx: &RequestContext, scope: Scope, item: T) -> Result<T> {
        let item = Self::prepare(scope, item)?;
        let created = self.store.create(ctx, &item).await?;
        info!(kind = %T::KIND, key = %created.key(), scope = %scope, "Created credential");
        Ok(created)
    }

    async fn update(&self, ctx: &RequestContext, scope: Scope, item: T) -> Result<T> {
        let item = Self::prepare(scope, item)?;
        self.store.update(ctx, &item).await?;
        info!(kind = %T::KIND, key = %item.key(), scope = %scope, "Updated credential");
        Ok(item)
    }

    async fn delete(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<()> {
        // Resolve first so a miss reports NotFound for exactly this scope.
        let existing = self.find(ctx, scope, key).await?;
        self.store.delete(ctx, existing.scope(), existing.key()).await?;
        info!(kind = %T::KIND, key = %key, scope = %scope, "Deleted credential");
        Ok(())
    }
}

//! Global-scope union of the Store catalog with read-only sources.

use async_trait::async_trait;
use kiln_protocol::{Credential, ListOptions, Pipeline, Repo, Scope};
use kiln_store::RequestContext;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::{append_missing, CredentialService};
use crate::error::{CatalogError, Result};

/// A credential provider that can be listed and searched but never written.
/// Its entries are Global-scope and computed on every call.
#[async_trait]
pub trait ReadOnlySource<T: Credential>: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn list(&self, ctx: &RequestContext) -> Result<Vec<T>>;

    async fn find(&self, ctx: &RequestContext, key: &str) -> Result<Option<T>> {
        Ok(self.list(ctx).await?.into_iter().find(|e| e.key() == key))
    }
}

/// Wraps a base service and adds read-only sources to Global scope.
///
/// Overrides `find`, `list` (Global only) and `list_for_pipeline`; every
/// mutation forwards to `base`.
pub struct CombinedCatalog<T: Credential> {
    base: Arc<dyn CredentialService<T>>,
    sources: Vec<Arc<dyn ReadOnlySource<T>>>,
}

impl<T: Credential> CombinedCatalog<T> {
    pub fn new(base: Arc<dyn CredentialService<T>>, sources: Vec<Arc<dyn ReadOnlySource<T>>>) -> Self {
        Self { base, sources }
    }

    /// Entries from every source in configured order, first key wins.
    async fn source_entries(&self, ctx: &RequestContext) -> Result<Vec<T>> {
        let mut entries = Vec::new();
        for source in &self.sources {
            let listed = source.list(ctx).await?;
            debug!(source = source.name(), kind = %T::KIND, count = listed.len(), "Listed read-only source");
            entries = append_missing(entries, listed);
        }
        Ok(entries)
    }
}

#[async_trait]
impl<T: Credential> CredentialService<T> for CombinedCatalog<T> {
    async fn find(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<T> {
        if !scope.is_global() {
            return self.base.find(ctx, scope, key).await;
        }
        match self.base.find(ctx, scope, key).await {
            Err(e) if e.is_not_found() => {
                for source in &self.sources {
                    if let Some(found) = source.find(ctx, key).await? {
                        return Ok(found);
                    }
                }
                Err(CatalogError::not_found(T::KIND, scope, key))
            }
            other => other,
        }
    }

    async fn list(&self, ctx: &RequestContext, scope: Scope, opts: ListOptions) -> Result<Vec<T>> {
        if !scope.is_global() {
            return self.base.list(ctx, scope, opts).await;
        }
        let stored = self.base.list(ctx, scope, ListOptions::all()).await?;
        let combined = append_missing(stored, self.source_entries(ctx).await?);
        Ok(opts.apply(combined))
    }

    async fn list_for_pipeline(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<T>> {
        // Source entries are Global, the lowest tier, so they only fill gaps.
        let resolved = self.base.list_for_pipeline(ctx, repo, pipeline).await?;
        Ok(append_missing(resolved, self.source_entries(ctx).await?))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use kiln_protocol::{Origin, Registry, RepoId};
    use kiln_store::MemoryStore;
    use std::collections::HashSet;

    struct StaticSource {
        entries: Vec<Registry>,
    }

    impl StaticSource {
        fn new(entries: &[(&str, &str)]) -> Arc<dyn ReadOnlySource<Registry>> {
            let entries = entries
                .iter()
                .map(|(address, user)| {
                    let mut registry = Registry::new(Scope::Global, address, user, "pw");
                    registry.mark_read_only(Origin::Filesystem);
                    registry
                })
                .collect();
            Arc::new(Self { entries })
        }
    }

    #[async_trait]
    impl ReadOnlySource<Registry> for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn list(&self, ctx: &RequestContext) -> Result<Vec<Registry>> {
            ctx.check()?;
            Ok(self.entries.clone())
        }
    }

    async fn combined(
        stored: &[(Scope, &str, &str)],
        sources: Vec<Arc<dyn ReadOnlySource<Registry>>>,
    ) -> CombinedCatalog<Registry> {
        let base = Arc::new(Catalog::<Registry>::new(Arc::new(MemoryStore::new())));
        let ctx = RequestContext::background();
        for (scope, address, user) in stored {
            base.create(&ctx, *scope, Registry::new(*scope, address, user, "pw"))
                .await
                .unwrap();
        }
        CombinedCatalog::<Registry>::new(base, sources)
    }

    fn users(list: &[Registry]) -> Vec<(&str, &str)> {
        list.iter()
            .map(|r| (r.address.as_str(), r.username.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_global_list_store_wins_on_collision() {
        let catalog = combined(
            &[(Scope::Global, "docker.io", "stored")],
            vec![StaticSource::new(&[("docker.io", "file"), ("ghcr.io", "file")])],
        )
        .await;

        let list = catalog
            .list(&RequestContext::background(), Scope::Global, ListOptions::all())
            .await
            .unwrap();
        assert_eq!(users(&list), vec![("docker.io", "stored"), ("ghcr.io", "file")]);

        let addresses: HashSet<_> = list.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(addresses.len(), list.len());
    }

    #[tokio::test]
    async fn test_earlier_source_wins_over_later_source() {
        let catalog = combined(
            &[],
            vec![
                StaticSource::new(&[("quay.io", "first")]),
                StaticSource::new(&[("quay.io", "second")]),
            ],
        )
        .await;
        let ctx = RequestContext::background();

        let found = catalog.find(&ctx, Scope::Global, "quay.io").await.unwrap();
        assert_eq!(found.username, "first");
        assert!(found.read_only);

        let list = catalog.list(&ctx, Scope::Global, ListOptions::all()).await.unwrap();
        assert_eq!(users(&list), vec![("quay.io", "first")]);
    }

    #[tokio::test]
    async fn test_non_global_scope_ignores_sources() {
        let catalog = combined(&[], vec![StaticSource::new(&[("docker.io", "file")])]).await;
        let ctx = RequestContext::background();
        let scope = Scope::Repository(RepoId::new(7));

        assert!(catalog.find(&ctx, scope, "docker.io").await.unwrap_err().is_not_found());
        assert!(catalog
            .list(&ctx, scope, ListOptions::all())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_list_fills_gaps_from_sources() {
        let repo = Repo::new(7, 3, "acme", "widgets");
        let catalog = combined(
            &[(Scope::Repository(repo.id), "docker.io", "repo")],
            vec![StaticSource::new(&[("docker.io", "file"), ("ghcr.io", "file")])],
        )
        .await;

        let list = catalog
            .list_for_pipeline(&RequestContext::background(), &repo, &Pipeline::default())
            .await
            .unwrap();
        assert_eq!(users(&list), vec![("docker.io", "repo"), ("ghcr.io", "file")]);
    }

    #[tokio::test]
    async fn test_global_list_pages_after_union() {
        let catalog = combined(
            &[(Scope::Global, "a.io", "stored")],
            vec![StaticSource::new(&[("b.io", "file"), ("c.io", "file")])],
        )
        .await;

        let page = catalog
            .list(&RequestContext::background(), Scope::Global, ListOptions::page(2, 2))
            .await
            .unwrap();
        assert_eq!(users(&page), vec![("c.io", "file")]);
    }

    #[tokio::test]
    async fn test_mutations_reach_store_only() {
        let catalog = combined(&[], vec![StaticSource::new(&[("docker.io", "file")])]).await;
        let ctx = RequestContext::background();

        let err = catalog.delete(&ctx, Scope::Global, "docker.io").await.unwrap_err();
        assert!(err.is_not_found());

        catalog
            .create(&ctx, Scope::Global, Registry::new(Scope::Global, "docker.io", "admin", "pw"))
            .await
            .unwrap();
        let found = catalog.find(&ctx, Scope::Global, "docker.io").await.unwrap();
        assert_eq!(found.username, "admin");
        assert!(!found.read_only);
    }
}

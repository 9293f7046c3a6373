//! Store collaborator interfaces.
//!
//! The persistence engine lives outside this framework. It must be safe under
//! concurrent access and keyed uniquely by (scope, key).

use async_trait::async_trait;
use kiln_protocol::{Credential, ListOptions, Repo, Scope};

use crate::context::RequestContext;
use crate::error::Result;

/// Scoped CRUD and listing for one credential type.
#[async_trait]
pub trait CredentialStore<T: Credential>: Send + Sync {
    async fn find(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<T>;

    async fn list(&self, ctx: &RequestContext, scope: Scope, opts: ListOptions) -> Result<Vec<T>>;

    /// Every entry that applies to `repo` across repository, organization and
    /// global scope, unfiltered by key, in the store's native order.
    async fn list_for_repo(&self, ctx: &RequestContext, repo: &Repo) -> Result<Vec<T>>;

    /// Persist a new entry and return it with its assigned id.
    async fn create(&self, ctx: &RequestContext, item: &T) -> Result<T>;

    async fn update(&self, ctx: &RequestContext, item: &T) -> Result<()>;

    async fn delete(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<()>;
}

/// Generic named-record store for server-wide settings.
#[async_trait]
pub trait ServerConfigStore: Send + Sync {
    /// Fetch a record. `StoreError::NotFound` when absent.
    async fn get(&self, ctx: &RequestContext, name: &str) -> Result<String>;

    /// Create a record if absent. `StoreError::AlreadyExists` when another
    /// writer created it first; the existing value is left untouched.
    async fn create(&self, ctx: &RequestContext, name: &str, value: &str) -> Result<()>;
}

//! Forge collaborator used to read config files at a pipeline's commit.

use async_trait::async_trait;
use kiln_protocol::{ConfigFile, Pipeline, Repo};
use kiln_store::RequestContext;

use crate::error::ForgeError;

/// File access into a repository at the pipeline's commit.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Contents of one file. `ForgeError::NotFound` when absent.
    async fn file(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
        path: &str,
    ) -> Result<String, ForgeError>;

    /// Files directly under a directory, named by their full path.
    async fn dir(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
        path: &str,
    ) -> Result<Vec<ConfigFile>, ForgeError>;
}

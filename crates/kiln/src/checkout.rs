//! Forge backed by a local checkout, for resolving configs without a forge.

use async_trait::async_trait;
use kiln_pipeline_config::{Forge, ForgeError};
use kiln_protocol::{ConfigFile, Pipeline, Repo};
use kiln_store::RequestContext;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Reads config files from a working tree. The pipeline commit is ignored:
/// whatever is checked out is what gets read.
pub struct CheckoutForge {
    root: PathBuf,
}

impl CheckoutForge {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a repository-relative path, refusing anything that escapes
    /// the checkout.
    fn resolve(&self, path: &str) -> Result<PathBuf, ForgeError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ForgeError::request(format!(
                "path '{}' is outside the checkout",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn map_io(path: &str, err: std::io::Error) -> ForgeError {
    if err.kind() == ErrorKind::NotFound {
        ForgeError::NotFound {
            path: path.to_string(),
        }
    } else {
        ForgeError::request(format!("{}: {}", path, err))
    }
}

#[async_trait]
impl Forge for CheckoutForge {
    async fn file(
        &self,
        ctx: &RequestContext,
        _repo: &Repo,
        _pipeline: &Pipeline,
        path: &str,
    ) -> Result<String, ForgeError> {
        let full = self.resolve(path)?;
        ctx.run(tokio::fs::read_to_string(full))
            .await?
            .map_err(|e| map_io(path, e))
    }

    async fn dir(
        &self,
        ctx: &RequestContext,
        _repo: &Repo,
        _pipeline: &Pipeline,
        path: &str,
    ) -> Result<Vec<ConfigFile>, ForgeError> {
        let full = self.resolve(path)?;
        let mut entries = ctx
            .run(tokio::fs::read_dir(full))
            .await?
            .map_err(|e| map_io(path, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io(path, e))? {
            let file_type = entry.file_type().await.map_err(|e| map_io(path, e))?;
            if !file_type.is_file() {
                continue;
            }
            let name = format!("{}/{}", path, entry.file_name().to_string_lossy());
            let data = ctx
                .run(tokio::fs::read_to_string(entry.path()))
                .await?
                .map_err(|e| map_io(&name, e))?;
            files.push(ConfigFile::new(name, data));
        }
        Ok(files)
    }
}

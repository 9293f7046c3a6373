//! Server config records kept as one file per record.
//!
//! Creation is atomic across processes: the value is written to a temp file
//! and hard-linked into place, which fails if the record already exists.
//! Readers therefore never observe a partially written record. Records hold
//! key material, so files are created owner-only (`0600`) on Unix.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{Result, StoreError};
use crate::store::ServerConfigStore;

pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(StoreError::backend(format!(
                "invalid server config record name: '{}'",
                name
            )));
        }
        Ok(self.dir.join(name))
    }

    async fn create_linked(&self, target: &Path, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self
            .dir
            .join(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
        if let Err(e) = write_private(&tmp, value).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        let linked = tokio::fs::hard_link(&tmp, target).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::already_exists(
                format!("server config '{}'", target.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_private(path: &Path, value: &str) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(value.as_bytes()).await?;
    file.sync_all().await
}

#[async_trait]
impl ServerConfigStore for FileConfigStore {
    async fn get(&self, ctx: &RequestContext, name: &str) -> Result<String> {
        let path = self.record_path(name)?;
        match ctx.run(tokio::fs::read_to_string(&path)).await? {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::not_found(format!("server config '{}'", name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, ctx: &RequestContext, name: &str, value: &str) -> Result<()> {
        let path = self.record_path(name)?;
        ctx.run(self.create_linked(&path, value)).await??;
        debug!(record = name, dir = %self.dir.display(), "Created server config record");
        Ok(())
    }
}

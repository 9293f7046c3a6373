//! In-process reference store.
//!
//! Rows keep insertion order, which is the store's native order for every
//! listing. Used by tests and by the diagnostic binary (seeded from JSON).

use async_trait::async_trait;
use kiln_protocol::{Credential, ListOptions, Registry, Repo, Scope, Secret};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{Result, StoreError};
use crate::store::{CredentialStore, ServerConfigStore};

/// Initial store contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub secrets: Vec<Secret>,
    #[serde(default)]
    pub registries: Vec<Registry>,
    #[serde(default)]
    pub server_config: BTreeMap<String, String>,
}

impl StoreSeed {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

struct Table<T> {
    next_id: i64,
    rows: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

impl<T: Credential> Table<T> {
    fn position(&self, scope: Scope, key: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.scope() == scope && row.key() == key)
    }

    fn find(&self, scope: Scope, key: &str) -> Result<T> {
        self.position(scope, key)
            .map(|idx| self.rows[idx].clone())
            .ok_or_else(|| StoreError::not_found(format!("{} '{}' in {}", T::KIND, key, scope)))
    }

    fn list(&self, scope: Scope, opts: ListOptions) -> Vec<T> {
        let rows = self
            .rows
            .iter()
            .filter(|row| row.scope() == scope)
            .cloned()
            .collect();
        opts.apply(rows)
    }

    fn list_for_repo(&self, repo: &Repo) -> Vec<T> {
        self.rows
            .iter()
            .filter(|row| row.scope().applies_to(repo))
            .cloned()
            .collect()
    }

    fn create(&mut self, item: &T) -> Result<T> {
        if self.position(item.scope(), item.key()).is_some() {
            return Err(StoreError::already_exists(format!(
                "{} '{}' in {}",
                T::KIND,
                item.key(),
                item.scope()
            )));
        }
        let mut row = item.clone();
        row.set_id(self.next_id);
        self.next_id += 1;
        self.rows.push(row.clone());
        Ok(row)
    }

    fn update(&mut self, item: &T) -> Result<()> {
        let idx = self
            .position(item.scope(), item.key())
            .ok_or_else(|| {
                StoreError::not_found(format!("{} '{}' in {}", T::KIND, item.key(), item.scope()))
            })?;
        let id = self.rows[idx].id();
        let mut row = item.clone();
        row.set_id(id);
        self.rows[idx] = row;
        Ok(())
    }

    fn delete(&mut self, scope: Scope, key: &str) -> Result<()> {
        let idx = self
            .position(scope, key)
            .ok_or_else(|| StoreError::not_found(format!("{} '{}' in {}", T::KIND, key, scope)))?;
        self.rows.remove(idx);
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::backend("memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::backend("memory store lock poisoned"))
}

/// Thread-safe in-memory store for secrets, registries and server config.
#[derive(Default)]
pub struct MemoryStore {
    secrets: RwLock<Table<Secret>>,
    registries: RwLock<Table<Registry>>,
    server_config: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed rows, assigning ids in order.
    pub fn from_seed(seed: StoreSeed) -> Result<Self> {
        let store = Self::new();
        {
            let mut secrets = write(&store.secrets)?;
            for secret in &seed.secrets {
                secrets.create(secret)?;
            }
            let mut registries = write(&store.registries)?;
            for registry in &seed.registries {
                registries.create(registry)?;
            }
            *write(&store.server_config)? = seed.server_config;
        }
        debug!(
            secrets = seed.secrets.len(),
            registries = seed.registries.len(),
            "Seeded memory store"
        );
        Ok(store)
    }
}

macro_rules! impl_memory_credential_store {
    ($ty:ty, $field:ident) => {
        #[async_trait]
        impl CredentialStore<$ty> for MemoryStore {
            async fn find(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<$ty> {
                ctx.check()?;
                let table = read(&self.$field)?;
                table.find(scope, key)
            }

            async fn list(
                &self,
                ctx: &RequestContext,
                scope: Scope,
                opts: ListOptions,
            ) -> Result<Vec<$ty>> {
                ctx.check()?;
                let table = read(&self.$field)?;
                Ok(table.list(scope, opts))
            }

            async fn list_for_repo(&self, ctx: &RequestContext, repo: &Repo) -> Result<Vec<$ty>> {
                ctx.check()?;
                let table = read(&self.$field)?;
                Ok(table.list_for_repo(repo))
            }

            async fn create(&self, ctx: &RequestContext, item: &$ty) -> Result<$ty> {
                ctx.check()?;
                let mut table = write(&self.$field)?;
                table.create(item)
            }

            async fn update(&self, ctx: &RequestContext, item: &$ty) -> Result<()> {
                ctx.check()?;
                let mut table = write(&self.$field)?;
                table.update(item)
            }

            async fn delete(&self, ctx: &RequestContext, scope: Scope, key: &str) -> Result<()> {
                ctx.check()?;
                let mut table = write(&self.$field)?;
                table.delete(scope, key)
            }
        }
    };
}

impl_memory_credential_store!(Secret, secrets);
impl_memory_credential_store!(Registry, registries);

#[async_trait]
impl ServerConfigStore for MemoryStore {
    async fn get(&self, ctx: &RequestContext, name: &str) -> Result<String> {
        ctx.check()?;
        let records = read(&self.server_config)?;
        records
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("server config '{}'", name)))
    }

    async fn create(&self, ctx: &RequestContext, name: &str, value: &str) -> Result<()> {
        ctx.check()?;
        let mut records = write(&self.server_config)?;
        if records.contains_key(name) {
            return Err(StoreError::already_exists(format!("server config '{}'", name)));
        }
        records.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

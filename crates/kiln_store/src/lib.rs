//! Store layer for Kiln credential resolution.
//!
//! The persistence engine is an external collaborator; this crate defines its
//! interface and the per-request context every call carries.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kiln_store::{CredentialStore, MemoryStore, RequestContext};
//!
//! let store = MemoryStore::new();
//! let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));
//! let rows: Vec<Secret> = store.list_for_repo(&ctx, &repo).await?;
//! ```

pub mod context;
mod error;
mod file_config;
mod memory;
mod store;

pub use context::{Interrupted, RequestContext};
pub use error::{Result, StoreError};
pub use file_config::FileConfigStore;
pub use memory::{MemoryStore, StoreSeed};
pub use store::{CredentialStore, ServerConfigStore};

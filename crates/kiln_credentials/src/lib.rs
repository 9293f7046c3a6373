//! Kiln credential resolution.
//!
//! One generic stack, instantiated for secrets and registry logins:
//!
//! - [`Catalog`]: scoped CRUD over a Store plus the priority merge
//!   (Repository > Organization > Global, first key wins)
//! - [`CombinedCatalog`]: adds read-only Global sources such as
//!   [`DockerConfigSource`]; Store entries win collisions
//! - [`ExtendedCatalog`]: lets an extension outrank base entries at
//!   pipeline time, falling back to the base result when it fails
//!
//! All layers implement [`CredentialService`], so the composition root can
//! stack them in any order and hand out `Arc<dyn CredentialService<T>>`.

pub mod catalog;
pub mod combined;
mod error;
pub mod extended;
pub mod extension;
pub mod filesystem;

pub use catalog::{merge_by_priority, Catalog, CredentialService};
pub use combined::{CombinedCatalog, ReadOnlySource};
pub use error::{CatalogError, ExtensionError, Result};
pub use extended::ExtendedCatalog;
pub use extension::{CredentialExtension, HttpExtension};
pub use filesystem::{
    parse_docker_config, CredentialHelper, DockerConfigSource, HelperCredentials, HelperError,
    ProcessCredentialHelper,
};

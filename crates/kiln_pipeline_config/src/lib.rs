//! Kiln pipeline config retrieval.
//!
//! [`ConfigFetcher`] reads config files from the [`Forge`] at the pipeline's
//! commit with bounded retries, then lets an optional [`ConfigExtension`]
//! replace the result.

mod error;
pub mod extension;
pub mod fetcher;
pub mod forge;

pub use error::{ConfigError, ForgeError};
pub use extension::{ConfigExtension, HttpConfigExtension};
pub use fetcher::ConfigFetcher;
pub use forge::Forge;

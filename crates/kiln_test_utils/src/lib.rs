//! Kiln Test Utilities
//!
//! - [`ScriptedServer`]: a local HTTP endpoint replaying canned responses,
//!   standing in for extensions and forges
//! - [`fixtures`]: repositories and pipelines used across crates
//!
//! # Usage
//!
//! ```rust,ignore
//! use kiln_test_utils::{ScriptedResponse, ScriptedServer};
//!
//! #[tokio::test]
//! async fn test_extension_answer() {
//!     let server = ScriptedServer::always(ScriptedResponse::no_content()).await.unwrap();
//!     // point the client at server.url("/secrets") ...
//!     assert_eq!(server.request_count(), 1);
//! }
//! ```

pub mod fixtures;
pub mod server;

pub use server::{unused_local_url, RecordedRequest, ScriptedResponse, ScriptedServer};

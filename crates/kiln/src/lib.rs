//! Kiln composition root.
//!
//! [`Services::build`] turns a [`ServerConfig`](kiln_protocol::ServerConfig)
//! and the persistence collaborators into the credential stacks and the
//! config fetcher the pipeline launcher depends on.

pub mod checkout;
pub mod services;

pub use checkout::CheckoutForge;
pub use services::{Services, Stores};

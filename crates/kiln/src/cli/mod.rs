//! Subcommands of the `kiln` binary.

pub mod config;
pub mod context;
pub mod key;
pub mod output;
pub mod resolve;

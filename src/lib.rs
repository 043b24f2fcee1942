pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod recommend;
pub mod rerank;
pub mod search;
pub mod server;
pub mod storage;
pub mod test_utils;

pub use error::{ArError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

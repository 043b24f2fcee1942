//! Shared test utilities for arec.
//!
//! Public (not `cfg(test)`) so the integration tests under `tests/` and the
//! benches can use the same catalog and scripted backends.

pub mod fixtures;
pub mod scripted;

pub use fixtures::{sample_catalog, CatalogFixture};
pub use scripted::{Reply, ScriptedGenerator};

/// Install a test-writer tracing subscriber once per process. `RUST_LOG`
/// controls the level; quiet by default.
pub fn init_test_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

//! Logging setup for test runs.

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber honoring `RUST_LOG`, writing through the
/// test-capture writer. Safe to call from every test; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

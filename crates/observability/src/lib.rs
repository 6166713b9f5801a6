//! Logging setup shared by binaries and tests.

/// Tracing subscriber configuration.
pub mod tracing;

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize logging routed through the test harness's captured output.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

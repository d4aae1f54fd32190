//! Process-wide tracing setup shared by every binary and test harness.

/// Initialize process-wide observability (structured JSON logs).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(DEFAULT_FILTER);
}

/// Human-readable output captured by the test harness, for `#[test]` functions.
pub fn init_for_tests() {
    tracing::init_for_tests(DEFAULT_FILTER);
}

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Subscriber configuration (filters, formatters).
pub mod tracing;

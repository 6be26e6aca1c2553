//! Tracing and logging setup shared by every binary and test harness.

/// Initialize process-wide structured logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;

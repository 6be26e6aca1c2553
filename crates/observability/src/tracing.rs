//! Tracing subscriber initialization.
//!
//! JSON lines on stdout, one object per event, with span fields attached so
//! `building_id` and the work order / inventory ids flow into every record.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber, reading the filter from `RUST_LOG`.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(false)
        .try_init()
        .is_ok()
}

//! Diagnostic logging setup.
//!
//! Logs go to stderr so JSON on stdout stays machine-readable. The filter is
//! read from `SX_LOG` (same syntax as `RUST_LOG`) and defaults to `warn`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "SX_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Build the filter from `SX_LOG`, falling back to the default on absence or
/// a malformed directive.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

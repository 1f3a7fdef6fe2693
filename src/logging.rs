//! Tracing subscriber setup for the `sshbed` binary.
//!
//! Library code only emits events; installing a subscriber is left to the
//! binary (or to tests that want to see the events).

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "SSHBED_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs a formatting subscriber writing to stderr, filtered by
/// [`LOG_ENV`]. Calling it again after a subscriber is installed does
/// nothing.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

//! Log setup for hosts that do not install their own `tracing` subscriber.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive (e.g. `upscale=debug`).
pub const LOG_ENV: &str = "UPSCALE_LOG";

/// Install a formatted subscriber filtered by [`LOG_ENV`], defaulting to
/// `info`. Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

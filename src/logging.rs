//! Tracing subscriber setup for the command line host.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if set, otherwise `fallback`.
pub fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install a compact stderr subscriber. Later calls are no-ops.
pub fn init(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(fallback))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

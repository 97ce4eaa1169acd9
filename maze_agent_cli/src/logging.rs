//! Progress logging to stderr.
//!
//! Verbosity comes from `RUST_LOG` and defaults to `info`, so every move,
//! death and backtrack is visible. The final result goes to stdout instead.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the stderr subscriber. The `info` default keeps a run narrated
/// move by move without setting `RUST_LOG`; `warn` keeps only deaths and revisits.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

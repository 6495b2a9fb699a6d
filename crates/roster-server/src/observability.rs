//! Tracing setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Install the global subscriber at the configured level. `RUST_LOG`, when
/// set and parseable, takes precedence.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = log_filter(std::env::var("RUST_LOG").ok(), &logging.level);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

fn log_filter(rust_log: Option<String>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

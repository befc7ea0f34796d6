//! Tracing subscriber setup for the command-line binary

use std::io;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,riskforge=debug"
    } else {
        "warn"
    }
}

/// Log to stderr so stdout carries only the JSON response.
/// `RUST_LOG` takes precedence over `--verbose`.
pub fn configure_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let stderr_log = fmt::layer().with_writer(io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_log)
        .init();
}

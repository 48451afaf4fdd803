//! Logging setup using `tracing` + `tracing-subscriber`
//!
//! Priority for determining the filter:
//! 1. `RANT_LOG` environment variable (env-filter syntax, e.g. "rant=debug")
//! 2. the verbosity flags (`-v` debug, default warn, `-q`/`-s` error)

use crate::runner::Verbosity;
use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "RANT_LOG";

/// Install the global subscriber; later calls are ignored
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn default_level(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Silent | Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "debug",
    }
}

//! Logging setup. Events go to stderr so stdout stays clean for tables and JSON.
//!
//! Verbosity maps to a level (`0` warn, `1` info, `2` debug, `3+` trace);
//! `RUST_LOG` takes precedence when set.

use tracing::Level;
use tracing_subscriber::EnvFilter;

pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("spendlens={}", level.to_string().to_lowercase())))
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level_for(verbosity)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

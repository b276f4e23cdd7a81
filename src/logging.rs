//! Logging setup for the binary.
//!
//! Diagnostics go through `tracing`. The subscriber writes to stderr so that
//! stdout stays free for command output (`gen-config`, `inspect`).

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Filter directive for the configured level raised by `-v` flags.
///
/// Each `-v` moves one step towards `trace`. Unknown levels fall back to
/// `info`.
pub fn filter_directive(level: &str, verbosity: u8) -> String {
    let base = LEVELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(level))
        .unwrap_or(2);
    let index = (base + verbosity as usize).min(LEVELS.len() - 1);
    format!("glidekit={}", LEVELS[index])
}

/// Install the global subscriber. `RUST_LOG` overrides the computed filter.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(level: &str, verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level, verbosity)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

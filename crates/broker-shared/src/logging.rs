//! # Logging Bootstrap
//!
//! Tracing subscriber initialization shared by the server binary and tests.
//! Output format and verbosity are controlled by `RUST_LOG` and
//! `BROKER_LOG_FORMAT` (`json` for structured output, anything else for
//! human-readable).

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops. Defaults to
/// `info` level when `RUST_LOG` is unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("BROKER_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if use_json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    // Already initialized (tests call this repeatedly); not an error.
    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }
}

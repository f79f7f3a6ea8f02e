//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate for structured events
//! - Text format by default, JSON when `log_format = json`
//! - Level filter from `RUST_LOG`, defaulting to info for this crate
//! - Events go to stderr; the decoy never writes to stdout

use std::io::IsTerminal;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "decoy_honeypot=info";

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}

/// Log a condition that stops the process.
///
/// tracing has no level above error, so critical events carry an explicit
/// `severity` field and a `critical:` prefix instead.
#[macro_export]
macro_rules! critical {
    ($($arg:tt)+) => {
        ::tracing::error!(severity = "critical", "critical: {}", format_args!($($arg)+))
    };
}

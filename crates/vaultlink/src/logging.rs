//! Logging setup for applications embedding the engine.
//!
//! The engine crates log through `log` macros and open `tracing` spans.
//! [`init_logging`] installs a `tracing-subscriber` formatter that receives
//! both; `RUST_LOG` overrides the level passed in.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install a text subscriber writing to stderr at `level`
/// (e.g. `"info"` or `"warn,vaultlink_vault=debug"`).
///
/// Only the first call has an effect. Returns whether this process's
/// subscriber was installed by us; `false` means another global subscriber
/// was already set.
pub fn init_logging(level: &str) -> bool {
    init_logging_with_format(level, LogFormat::Text)
}

/// Like [`init_logging`], choosing the output format
pub fn init_logging_with_format(level: &str, format: LogFormat) -> bool {
    *INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match format {
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true),
                )
                .try_init(),
        };

        match installed {
            Ok(()) => {
                log::debug!("Logging initialised at '{}' ({:?})", level, format);
                true
            }
            Err(_) => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let first = init_logging("debug");
        let second = init_logging_with_format("trace", LogFormat::Json);
        assert_eq!(first, second);
    }
}

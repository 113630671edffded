//! Logging and tracing utilities for swgkit
//!
//! Codecs report recoverable malformation as `warn` events and per-file
//! summaries as `debug` events. This module installs a subscriber for
//! binaries and offers timing helpers around decode calls.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "warn,swgkit=info,swgkit_parsers=info";

/// Initialize the default tracing subscriber
///
/// This should be called once at application startup. Multiple calls are safe
/// and will be ignored.
pub fn init_default() {
    init_with_config(TracingConfig::default());
}

/// Initialize tracing with a custom configuration
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        return;
    }

    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number);

    // Another subscriber may already be installed by the host application
    let _ = tracing_subscriber::registry().with(fmt_layer).with(filter).try_init();
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl TracingConfig {
    /// Config whose level follows a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace
    pub fn from_verbosity(verbose: u8) -> Self {
        let default_level = match verbose {
            0 => DEFAULT_FILTER.to_string(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        Self {
            default_level,
            show_file: verbose >= 3,
            show_line_number: verbose >= 3,
            ..Self::default()
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_FILTER.to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

#[macro_export]
macro_rules! log_decode_start {
    ($codec:expr, $path:expr) => {
        tracing::info!(
            codec = %$codec,
            path = %$path.display(),
            "Starting decode"
        );
    };
}

#[macro_export]
macro_rules! log_decode_error {
    ($codec:expr, $error:expr) => {
        tracing::error!(
            codec = %$codec,
            error = %$error,
            "Decode failed"
        );
    };
}

/// Run a codec operation inside a span and log its duration
pub fn instrument_decode<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("decode", codec = %name);
    let _guard = span.enter();

    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed();

    tracing::debug!(duration_ms = %duration.as_millis(), "Codec operation complete");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert!(config.default_level.contains("info"));
        assert!(config.show_target);
        assert!(!config.show_thread_ids);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(TracingConfig::from_verbosity(0).default_level, DEFAULT_FILTER);
        assert_eq!(TracingConfig::from_verbosity(2).default_level, "debug");
        assert!(TracingConfig::from_verbosity(5).show_line_number);
    }

    #[test]
    fn test_instrument_decode() {
        let result = instrument_decode("test", || 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_default();
        init_default();
    }
}

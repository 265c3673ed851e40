//! Structured logging setup using the `tracing` ecosystem.
//!
//! Compact console output on stderr plus a daily-rotated log file, either
//! plain text or JSON lines.

use std::path::Path;

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::constants::APP_NAME;
use crate::error::{PadError, PadResult};

/// Install the global subscriber.
///
/// `level` takes any `EnvFilter` directive, e.g. "info" or
/// "pad_socket=debug"; an unparsable directive falls back to "info".
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> PadResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = rolling::daily(log_dir, format!("{APP_NAME}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // Exactly one of the two file layers is installed.
    let json_file = json_output.then(|| {
        fmt::layer()
            .json()
            .with_writer(writer.clone())
            .with_file(true)
            .with_line_number(true)
    });
    let text_file = (!json_output).then(|| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(filter(level))
        .with(console_layer())
        .with(json_file)
        .with(text_file)
        .try_init()
        .map_err(|e| PadError::Internal(format!("logging already initialized: {e}")))?;

    tracing::info!(level, dir = %log_dir.display(), json = json_output, "logging initialized");
    Ok(LogGuard { _guard: guard })
}

/// Console-only subscriber for tests and short runs. Later calls are no-ops.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(console_layer())
        .try_init();
}

/// Flushes the file writer when dropped.
pub struct LogGuard {
    _guard: WorkerGuard,
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer().with_writer(std::io::stderr).compact()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logging_is_reentrant() {
        init_console_logging("debug");
        init_console_logging("info");
    }

    #[test]
    fn test_bad_directive_falls_back() {
        let _ = filter("not==a==directive");
    }
}

//! Logging infrastructure for mkv-insert.
//!
//! This module provides:
//! - Per-job loggers with file + host callback dual output
//! - Compact mode with progress filtering
//! - Tail buffer of tool output for error diagnosis
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use mkvinsert_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("movie", "/path/to/logs", LogConfig::default(), None).unwrap();
//!
//! logger.info("Starting merge");
//! logger.phase("Probe");
//! logger.decision("drop enriched#2 [audio eng ac3]: duplicate of source#1");
//! logger.progress(50);
//! logger.success("Merge completed");
//! ```

mod job_logger;
mod types;

use std::path::Path;

pub use job_logger::JobLogger;
pub use types::{HostLogCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` and falls back to `default_level`. Output goes to
/// stderr; when `log_dir` is given, a plain-text copy also goes to
/// `<log_dir>/mkv-insert.log`. Keep the returned guard alive until exit so
/// buffered lines reach the file.
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "mkv-insert.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

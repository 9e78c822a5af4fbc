//! provides logging helpers

use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

#[derive(Debug, Clone, derive_more::Display)]
pub enum LoggingError {
    #[display("Invalid log path {path}")]
    InvalidPath { path: String },
    #[display("Failed to create rolling file appender in {path}")]
    Appender { path: String },
}

impl core::error::Error for LoggingError {}

fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber
///
/// Events go to stderr and, when `log_path` is given, to a daily rotated
/// file as well. The returned guard flushes the file writer on drop.
pub fn init<P: AsRef<Path>>(
    log_path: Option<P>,
) -> Result<Option<WorkerGuard>, Report<LoggingError>> {
    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    let Some(log_path) = log_path else {
        registry().with(fmt_layer).init();
        return Ok(None);
    };

    let log_path = log_path.as_ref();
    let invalid_path = || LoggingError::InvalidPath {
        path: log_path.display().to_string(),
    };
    let directory = log_path.parent().ok_or_else(|| Report::new(invalid_path()))?;
    let file = log_path
        .file_name()
        .and_then(|file| file.to_str())
        .ok_or_else(|| Report::new(invalid_path()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file)
        .max_log_files(3)
        .build(directory)
        .change_context_lazy(|| LoggingError::Appender {
            path: directory.display().to_string(),
        })?;

    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let file_layer = layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter());

    registry().with(fmt_layer).with(file_layer).init();
    Ok(Some(file_guard))
}

//! Logging utilities for the Bookwell application.
//!
//! Every crate logs through the `tracing` macros; this module owns the one
//! place where a subscriber gets installed.

use std::path::Path;
use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at INFO.
///
/// # Examples
///
/// ```
/// use bookwell_common::logging;
///
/// logging::init();
/// // A second call is a no-op
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// `RUST_LOG` is still honoured; the level is added as a `bookwell=<level>`
/// directive on top of it. Uses `try_init`, so calling this when a global
/// subscriber already exists (tests, embedding) does nothing.
pub fn init_with_level(level: Level) {
    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .with(crate_filter(level))
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Like [`init_with_level`], and additionally writes daily-rolling JSON logs
/// into `directory`.
///
/// The returned guard flushes the background writer on drop; keep it alive
/// for the lifetime of the process.
pub fn init_with_file(level: Level, directory: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(directory, "bookwell.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_writer(non_blocking)
        .with_filter(crate_filter(level));

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(crate_filter(level));

    let result = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    if result.is_ok() {
        info!(
            "Logging initialized at level: {}, writing JSON logs to {}",
            level,
            directory.display()
        );
    }
    guard
}

fn crate_filter(level: Level) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match format!("bookwell={}", level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Parse a level name from configuration, falling back to INFO.
pub fn parse_level(name: &str) -> Level {
    name.parse().unwrap_or(Level::INFO)
}

/// Log a result, with different messages for success and error cases.
///
/// Returns the original result, allowing this function to be used in a chain.
pub fn log_result<T, E: std::fmt::Display>(
    result: Result<T, E>,
    success_message: &str,
    error_context: &str,
) -> Result<T, E> {
    match &result {
        Ok(_) => info!("{}", success_message),
        Err(e) => error!("{}: {}", error_context, e),
    }
    result
}

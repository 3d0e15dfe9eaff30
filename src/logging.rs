//! # Logging Module
//!
//! Installs the global `tracing` subscriber: one console layer and one daily
//! rolling file layer, both stamped with local time.
//!
//! The level comes from `[logging] level` unless `RUST_LOG` is set.

use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Result, WoabotError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Builds the level filter: `RUST_LOG` if set, otherwise the configured level.
///
/// # Errors
///
/// Returns `Logging` if the configured level is not a valid filter directive.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| WoabotError::Logging(e.to_string())),
    }
}

/// Installs the console and file layers.
///
/// The returned guard flushes the file writer when dropped and must be held
/// for the lifetime of the process.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created, the level is
/// invalid, or a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
    fs::create_dir_all(&config.log_dir)?;

    let appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(build_filter(&config.level)?)
        .with(fmt::layer().with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string())))
        .with(
            fmt::layer()
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| WoabotError::Logging(e.to_string()))?;

    Ok(guard)
}

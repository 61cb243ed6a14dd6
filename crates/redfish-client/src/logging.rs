//! Tracing subscriber setup for applications embedding the client
//!
//! Console output goes to stderr. An optional daily-rolling file under
//! `log_dir` receives its own, usually more verbose, level. `RUST_LOG`
//! overrides the console level when set.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::{RedfishError, Result};

/// File name prefix of the rolling log
pub const LOG_FILE_NAME: &str = "redfish.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Console filter directive, e.g. `info` or `redfish_client=debug`
    pub console_level: String,

    /// File filter directive
    pub file_level: String,

    /// Directory for the rolling log file; `None` disables file output
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "info".into(),
            file_level: "debug".into(),
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn console_level(mut self, level: impl Into<String>) -> Self {
        self.console_level = level.into();
        self
    }

    pub fn file_level(mut self, level: impl Into<String>) -> Self {
        self.file_level = level.into();
        self
    }
}

fn filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| RedfishError::configuration(format!("invalid log filter {:?}: {}", directive, e)))
}

/// Install the global subscriber
///
/// Keep the returned guard alive for as long as file logging is wanted;
/// dropping it flushes and stops the background writer. Fails if a global
/// subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(env) => env,
        Err(_) => filter(&config.console_level)?,
    };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(console_filter);

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                RedfishError::configuration(format!(
                    "cannot create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter(&config.file_level)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| RedfishError::configuration(format!("logging already initialized: {}", e)))?;

    if let Some(dir) = &config.log_dir {
        tracing::info!("Logging initialized. Log directory: {}", dir.display());
    }
    Ok(guard)
}

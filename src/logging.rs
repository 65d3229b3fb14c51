//! Log subscriber setup driven by the `[logging]` config section.
//!
//! Console output always goes to stderr, as text or JSON. When a directory is
//! configured, JSON records are also written to a daily-rotated file there.
//! `RUST_LOG` takes precedence over the configured level.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Log file prefix inside the logs directory.
const LOG_FILE_PREFIX: &str = "secrets-admission.log";

/// Level used when neither `RUST_LOG` nor the config yields a valid filter.
const FALLBACK_LEVEL: &str = "info";

/// Keeps the file writer alive. Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    file: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// True when records are also written to a log file.
    pub fn writes_file(&self) -> bool {
        self.file.is_some()
    }
}

/// Build the level filter: `RUST_LOG`, then `config.level`, then `info`.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    let (text_console, json_console) = if config.json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter(config))
        .with(file_layer)
        .with(text_console)
        .with(json_console)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(LoggingGuard { file: guard })
}

fn file_writer(dir: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create logs directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

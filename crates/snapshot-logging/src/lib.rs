//! Logging setup for the snapshot simulation
//!
//! Wraps `tracing-subscriber` so the simulation binary and its tests share one
//! way of installing a subscriber:
//!
//! - **Pretty console**: human-readable output for interactive runs (default)
//! - **JSONL console**: one JSON object per event, for piping into tools
//! - **File output**: JSONL written through `tracing-appender`
//!
//! # Quick Start
//!
//! ```ignore
//! use snapshot_logging::{LogConfig, SubscriberBuilder};
//!
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//!
//! tracing::info!(peer = %'A', epoch = 7, "Snapshot initiated");
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Builder for configuring and installing the global subscriber
pub struct SubscriberBuilder {
    config: LogConfig,
}

impl SubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Switch console output between pretty and JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Install the subscriber globally.
    ///
    /// The returned guard flushes file output when dropped and must be kept
    /// alive for the duration of the program.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let registry = Registry::default().with(env_filter);

        let (file_output, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let console = &self.config.console;

        // Separate arms for pretty vs JSONL console keep the layer types concrete
        match (console.enabled, console.pretty, file_output) {
            (true, true, Some(writer)) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .with_ansi(console.ansi)
                    .with_target(true);
                registry
                    .with(console_layer)
                    .with(jsonl_layer().with_writer(writer))
                    .try_init()?;
            }
            (true, false, Some(writer)) => {
                registry
                    .with(jsonl_layer())
                    .with(jsonl_layer().with_writer(writer))
                    .try_init()?;
            }
            (true, true, None) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .with_ansi(console.ansi)
                    .with_target(true);
                registry.with(console_layer).try_init()?;
            }
            (true, false, None) => {
                registry.with(jsonl_layer()).try_init()?;
            }
            (false, _, Some(writer)) => {
                registry
                    .with(jsonl_layer().with_writer(writer))
                    .try_init()?;
            }
            (false, _, None) => {
                registry.try_init()?;
            }
        }

        Ok(guard)
    }

    /// Like [`init`](Self::init), but an already-installed global subscriber
    /// is not an error. Returns `Ok(None)` in that case.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        match self.init() {
            Err(LoggingError::AlreadyInitialized(_)) => Ok(None),
            other => other,
        }
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn jsonl_layer<S>() -> tracing_subscriber::fmt::Layer<
    S,
    tracing_subscriber::fmt::format::JsonFields,
    tracing_subscriber::fmt::format::Format<tracing_subscriber::fmt::format::Json>,
>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .flatten_event(true)
}

// `Never` truncates the single file; the rolling appenders append
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;
    let pair = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            tracing_appender::non_blocking(File::create(path)?)
        }
        RotationStrategy::Daily => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &config.directory,
            &config.prefix,
        )),
        RotationStrategy::Hourly => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::HOURLY,
            &config.directory,
            &config.prefix,
        )),
    };
    Ok(pair)
}

/// Initialize logging for tests. Safe to call from every test.
pub fn init_testing() {
    let _ = SubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

//! Console and JSONL logging for dtnsim
//!
//! Library crates only emit `tracing` events; the binary picks an output
//! setup once at startup through [`SimSubscriberBuilder`].
//!
//! # Quick Start
//!
//! ```ignore
//! use dtnsim_logging::{LogConfig, SimSubscriberBuilder};
//!
//! // JSONL to console
//! let _guard = SimSubscriberBuilder::new().init();
//!
//! // Pretty human-readable output while developing
//! let _guard = SimSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! The returned guard flushes file output on drop, so keep it alive until
//! the run ends.

pub mod config;
pub mod error;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use error::LogError;

use std::fs::{self, File};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Builder for configuring and initializing the dtnsim logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
#[derive(Debug, Clone, Default)]
pub struct SimSubscriberBuilder {
    config: LogConfig,
}

impl SimSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
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

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally
    ///
    /// Setup failures are reported on stderr and leave logging disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {e}");
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if a global subscriber has already been set or the
    /// configuration cannot be applied.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let directives = self.config.filter_directives();
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&directives).map_err(|e| LogError::Filter {
                directives: directives.clone(),
                reason: e.to_string(),
            })?,
        };
        let console_level = match &self.config.console.level {
            Some(level) => level.parse::<LevelFilter>().map_err(|e| LogError::Filter {
                directives: level.clone(),
                reason: e.to_string(),
            })?,
            None => LevelFilter::TRACE,
        };

        let console = &self.config.console;
        let jsonl = &self.config.jsonl;

        let pretty_console = (console.enabled && console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_filter(console_level)
        });

        let jsonl_console = (console.enabled && !console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
                .with_filter(console_level)
        });

        let mut guard = None;
        let file_layer = match &self.config.file {
            Some(file_config) => {
                let (writer, file_guard) = file_writer(file_config)?;
                guard = Some(file_guard);
                Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(jsonl.include_spans)
                        .flatten_event(jsonl.flatten_events)
                        .with_file(jsonl.include_location)
                        .with_line_number(jsonl.include_location)
                        .with_writer(writer),
                )
            }
            None => None,
        };

        Registry::default()
            .with(env_filter)
            .with(pretty_console)
            .with(jsonl_console)
            .with(file_layer)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;
        Ok(guard)
    }
}

/// Non-blocking writer for file output; `Never` truncates a single file
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    let io_error = |source| LogError::Io {
        path: config.directory.clone(),
        source,
    };
    fs::create_dir_all(&config.directory).map_err(io_error)?;
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(&path).map_err(|source| LogError::Io { path, source })?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .build(&config.directory)
        .map_err(|e| LogError::Io {
            path: config.directory.clone(),
            source: std::io::Error::other(e),
        })?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    SimSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    SimSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output); repeated calls are harmless
pub fn init_testing() {
    let _ = SimSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

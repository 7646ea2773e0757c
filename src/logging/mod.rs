//! Logging framework for the measurement pipeline
//!
//! Structured `tracing` output with per-run correlation ids, a console layer
//! and an optional daily rolling JSON file layer.

pub mod config;
pub mod spans;

use crate::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

pub use config::LoggingConfig;
pub use spans::{PipelineSpan, RunSpan};

thread_local! {
    static CORRELATION_ID: std::cell::RefCell<Option<Uuid>> =
        const { std::cell::RefCell::new(None) };
}

/// Keeps the file writer alive; dropping it flushes pending log lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the logging system with the provided configuration
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    config
        .validate()
        .map_err(|e| Error::InvalidConfiguration(format!("logging: {e}")))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(config.include_file_location)
            .with_file(config.include_file_location)
            .with_writer(std::io::stderr);
        layers.push(console_layer.boxed());
    }

    let mut file_guard = None;
    if let Some(ref log_dir) = config.log_directory {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "tubercles.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json();
        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| Error::InvalidConfiguration(format!("logging already initialized: {e}")))?;

    tracing::info!(?config, "Logging system initialized");
    Ok(LoggingGuard { _file: file_guard })
}

/// Set a correlation ID for the current thread
pub fn set_correlation_id(id: Uuid) {
    CORRELATION_ID.with(|correlation_id| {
        *correlation_id.borrow_mut() = Some(id);
    });
}

/// Get the current correlation ID for this thread
pub fn get_correlation_id() -> Option<Uuid> {
    CORRELATION_ID.with(|correlation_id| *correlation_id.borrow())
}

/// Generate a new correlation ID and set it for the current thread
pub fn new_correlation_id() -> Uuid {
    let id = Uuid::new_v4();
    set_correlation_id(id);
    id
}

/// Clear the correlation ID for the current thread
pub fn clear_correlation_id() {
    CORRELATION_ID.with(|correlation_id| {
        *correlation_id.borrow_mut() = None;
    });
}

/// Fresh correlation id for the current thread, cleared when dropped.
pub struct CorrelationScope {
    id: Uuid,
}

impl CorrelationScope {
    pub fn new() -> Self {
        Self {
            id: new_correlation_id(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for CorrelationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CorrelationScope {
    fn drop(&mut self) {
        clear_correlation_id();
    }
}

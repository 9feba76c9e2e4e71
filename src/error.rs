use std::error::Error;
use std::time::Duration;

/// Boxed error type used by store implementations to carry driver errors.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Rejected configuration values.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("flush interval must be greater than zero")]
    ZeroFlushInterval,

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Failures reported by a [`LogStore`](crate::store::LogStore).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("failed to connect to log store: {0}")]
    Connect(#[source] BoxError),

    #[error("failed to insert log batch: {0}")]
    Insert(#[source] BoxError),

    #[error("log store is not connected")]
    NotConnected,

    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
}

/// Errors raised while starting the background writer.
#[derive(thiserror::Error, Debug)]
pub enum WriterError {
    #[error("batch writer requires a running Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome of a shutdown that did not complete cleanly.
///
/// Resources are released regardless; this only reports what happened.
#[derive(thiserror::Error, Debug)]
pub enum ShutdownError {
    #[error("batch writer did not stop within {0:?}, task aborted")]
    Timeout(Duration),

    #[error("batch writer task panicked")]
    Panicked,

    #[error("batch writer already closed")]
    AlreadyClosed,
}

/// Errors raised while assembling a logging pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error("failed to open log file: {0}")]
    File(#[from] tracing_appender::rolling::InitError),

    #[error("failed to create log directory: {0}")]
    LogDir(#[source] std::io::Error),

    #[error("invalid mask pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Backend(#[from] crate::backend::BackendBuildError),
}

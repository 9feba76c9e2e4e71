pub mod record;
pub mod row;
pub mod error;
pub mod config;
pub mod env;

pub mod filter;
pub mod format;
pub mod sink;

pub mod queue;
pub mod store;
pub mod writer;

pub mod manager;
pub mod registry;
pub mod trace;
pub mod layer;
pub mod init;

pub mod backend;
pub mod noop_store;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

/// Target prefix of every event emitted by this crate.
pub(crate) const CRATE_TARGET: &str = "tracing_log_pipeline";

/// Target of the pipeline's own diagnostics.
pub(crate) const INTERNAL_TARGET: &str = "tracing_log_pipeline::internal";

pub use config::{LogConfig, PersistenceConfig};
pub use manager::{Logger, LoggerManager};
pub use record::{Level, LogRecord, RecordBuilder};
pub use registry::Registry;
pub use writer::{BatchWriter, WriterState, WriterStats};

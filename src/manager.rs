use crate::backend::{make_store_from_config, parse_dsn, store_for_persistence, BackendBuildError};
use crate::config::{environment, LogConfig};
use crate::error::{PipelineError, ShutdownError};
use crate::filter::{EnvironmentFilter, Filter, SensitiveDataFilter};
use crate::format::{ColoredFormatter, Formatter, JsonFormatter, TextFormatter, TextLayout};
use crate::record::{Level, LogRecord, RecordBuilder};
use crate::sink::{ConsoleSink, DatabaseSink, FileSink, Sink};
use crate::store::LogStore;
use crate::trace::error_chain;
use crate::writer::WriterStats;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

/// Filters and sinks shared by every logger of one manager.
pub struct Pipeline {
    level: Level,
    filters: Vec<Box<dyn Filter>>,
    sinks: RwLock<Vec<Arc<dyn Sink>>>,
}

impl Pipeline {
    pub fn new(level: Level, filters: Vec<Box<dyn Filter>>) -> Self {
        Self {
            level,
            filters,
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.sinks.write().push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Run filters in order, then hand the record to every sink whose
    /// level admits it.
    pub fn dispatch(&self, mut record: LogRecord) {
        if record.level < self.level {
            return;
        }
        for filter in &self.filters {
            if !filter.filter(&mut record) {
                return;
            }
        }
        for sink in self.sinks.read().iter() {
            if record.level >= sink.level() {
                sink.emit(&record);
            }
        }
    }

    fn sinks(&self) -> Vec<Arc<dyn Sink>> {
        self.sinks.read().clone()
    }
}

/// Named handle onto a [`Pipeline`].
///
/// Child loggers share the parent's filters and sinks; only the dotted
/// name differs. Logging methods never fail and never block on I/O.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    pipeline: Arc<Pipeline>,
}

impl Logger {
    pub fn new(name: impl Into<Arc<str>>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            name: name.into(),
            pipeline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logger named `<self>.<name>` sharing this logger's pipeline.
    pub fn child(&self, name: &str) -> Logger {
        Logger::new(format!("{}.{}", self.name, name), Arc::clone(&self.pipeline))
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.pipeline.level()
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        if self.is_enabled_for(level) {
            self.pipeline
                .dispatch(LogRecord::new(level, self.name.as_ref(), message));
        }
    }

    /// Log a record carrying extra fields, an exception or a location.
    pub fn log_with(&self, builder: RecordBuilder) {
        if self.is_enabled_for(builder.level()) {
            self.pipeline.dispatch(builder.build(self.name.as_ref()));
        }
    }

    /// Dispatch a record produced elsewhere, keeping its logger name.
    pub fn log_record(&self, record: LogRecord) {
        self.pipeline.dispatch(record);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, message);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}

/// One configured pipeline for an `(application, environment)` pair.
///
/// Built from a [`LogConfig`]: optional masking, environment tagging,
/// console and file sinks, and a database sink when
/// [`LogConfig::database`] is set. Obtain shared instances through the
/// [`Registry`](crate::registry::Registry).
pub struct LoggerManager {
    config: LogConfig,
    pipeline: Arc<Pipeline>,
    loggers: Mutex<HashMap<String, Logger>>,
}

impl LoggerManager {
    /// Build the pipeline, creating the database store from
    /// `config.sink_dsn`, or else from `config.database`, if present.
    pub fn new(config: LogConfig) -> Result<Self, PipelineError> {
        let store = match (&config.sink_dsn, &config.database) {
            (Some(dsn), _) => {
                let backend = parse_dsn(dsn).map_err(BackendBuildError::from)?;
                Some(make_store_from_config(&backend)?)
            }
            (None, Some(db)) => Some(store_for_persistence(db)?),
            (None, None) => None,
        };
        Self::build(config, store)
    }

    /// Build the pipeline around an explicit store. `config.database`
    /// supplies the batching parameters (defaults when absent).
    pub fn with_store(config: LogConfig, store: Box<dyn LogStore>) -> Result<Self, PipelineError> {
        Self::build(config, Some(store))
    }

    fn build(config: LogConfig, store: Option<Box<dyn LogStore>>) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut filters: Vec<Box<dyn Filter>> = Vec::new();
        if config.mask_sensitive {
            filters.push(Box::new(SensitiveDataFilter::with_additional_keys(
                &config.extra_mask_patterns,
            )?));
        }
        filters.push(Box::new(EnvironmentFilter::new(config.environment.clone())));

        let pipeline = Arc::new(Pipeline::new(config.level, filters));

        if config.console_output {
            pipeline.add_sink(Arc::new(ConsoleSink::new(
                config.level,
                console_formatter(&config),
            )));
        }

        if config.file_output {
            let formatter: Box<dyn Formatter> = if config.json_format {
                Box::new(JsonFormatter)
            } else {
                Box::new(TextFormatter::new(TextLayout::File))
            };
            pipeline.add_sink(Arc::new(FileSink::from_config(&config, formatter)?));
        }

        if let Some(store) = store {
            let db = config.database.clone().unwrap_or_default();
            pipeline.add_sink(Arc::new(DatabaseSink::spawn(store, &db)?));
        }

        Ok(Self {
            config,
            pipeline,
            loggers: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// `(name, environment)` identity of this manager.
    pub fn identity(&self) -> (&str, &str) {
        (&self.config.name, &self.config.environment)
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Logger named `<app>.<name>`, or the root `<app>` logger.
    pub fn get_logger(&self, name: Option<&str>) -> Logger {
        let full_name = match name {
            Some(name) if !name.is_empty() => format!("{}.{}", self.config.name, name),
            _ => self.config.name.clone(),
        };
        self.loggers
            .lock()
            .entry(full_name.clone())
            .or_insert_with(|| Logger::new(full_name, Arc::clone(&self.pipeline)))
            .clone()
    }

    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.pipeline.add_sink(sink);
    }

    /// Log `error` and its source chain at ERROR level through `logger`.
    pub fn log_exception<E>(&self, logger: &Logger, error: &E, message: &str)
    where
        E: Error + ?Sized,
    {
        logger.log_with(
            RecordBuilder::new(Level::Error, format!("{message}: {error}"))
                .exception(error_chain(error))
                .field("exception_type", std::any::type_name::<E>()),
        );
    }

    /// Counters of the database sink, if one is configured.
    pub fn statistics(&self) -> Option<WriterStats> {
        self.pipeline.sinks().iter().find_map(|sink| sink.stats())
    }

    pub fn flush(&self) {
        for sink in self.pipeline.sinks() {
            sink.flush();
        }
    }

    /// Flush every sink and shut down background writers.
    ///
    /// Every sink is shut down even if an earlier one fails; the first
    /// failure is returned.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        self.flush();
        let mut first_err = None;
        for sink in self.pipeline.sinks() {
            if let Err(e) = sink.shutdown().await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn console_formatter(config: &LogConfig) -> Box<dyn Formatter> {
    if config.json_format {
        Box::new(JsonFormatter)
    } else if config.environment == environment::DEVELOPMENT {
        Box::new(ColoredFormatter)
    } else {
        Box::new(TextFormatter::new(TextLayout::Console))
    }
}

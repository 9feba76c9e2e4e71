use crate::config::{LogConfig, PersistenceConfig};
use crate::error::{PipelineError, ShutdownError, WriterError};
use crate::format::Formatter;
use crate::record::{Level, LogRecord};
use crate::store::LogStore;
use crate::writer::{BatchWriter, WriterStats};
use crate::INTERNAL_TARGET;
use async_trait::async_trait;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use parking_lot::Mutex;
use std::io::Write;
use tracing_appender::rolling::{Rotation, RollingFileAppender};

/// Destination that receives enriched records from a pipeline.
///
/// `emit` runs synchronously on the producer's thread, so implementations
/// must be cheap and must never block on remote I/O. Failures are
/// absorbed by the sink.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Records below this level are not passed to [`emit`](Self::emit).
    fn level(&self) -> Level;

    fn emit(&self, record: &LogRecord);

    /// Flush buffered output. Default is a no-op.
    fn flush(&self) {}

    /// Persistence counters, for sinks backed by a [`BatchWriter`].
    fn stats(&self) -> Option<WriterStats> {
        None
    }

    /// Release resources. Default is a no-op.
    async fn shutdown(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}

/// Writes formatted records to stdout.
pub struct ConsoleSink {
    level: Level,
    formatter: Box<dyn Formatter>,
}

impl ConsoleSink {
    pub fn new(level: Level, formatter: Box<dyn Formatter>) -> Self {
        Self { level, formatter }
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &LogRecord) {
        let line = self.formatter.format(record);
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Appends formatted records to `<log_dir>/<name>.log`.
///
/// With the default [`FileRotation::Size`](crate::config::FileRotation)
/// the active file rolls over to `<name>.log.1` once it passes
/// `max_bytes`, keeping at most `backup_count` old files. Time-based
/// rotation is delegated to `tracing-appender`.
pub struct FileSink {
    level: Level,
    formatter: Box<dyn Formatter>,
    appender: Mutex<FileAppender>,
}

enum FileAppender {
    BySize(FileRotate<AppendCount>),
    ByTime(RollingFileAppender),
}

impl Write for FileAppender {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            FileAppender::BySize(file) => file.write(buf),
            FileAppender::ByTime(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            FileAppender::BySize(file) => file.flush(),
            FileAppender::ByTime(file) => file.flush(),
        }
    }
}

impl FileSink {
    /// Open the log file described by `config`, creating the directory.
    pub fn from_config(
        config: &LogConfig,
        formatter: Box<dyn Formatter>,
    ) -> Result<Self, PipelineError> {
        let dir = config.log_dir_or_default();
        let schedule = if config.rotate_logs {
            config.rotation.time_schedule()
        } else {
            Some(Rotation::NEVER)
        };

        let appender = match schedule {
            None => {
                std::fs::create_dir_all(&dir).map_err(PipelineError::LogDir)?;
                FileAppender::BySize(FileRotate::new(
                    dir.join(format!("{}.log", config.name)),
                    AppendCount::new(config.backup_count.max(1)),
                    ContentLimit::BytesSurpassed(config.max_bytes.max(1)),
                    Compression::None,
                    #[cfg(unix)]
                    None,
                ))
            }
            Some(rotation) => {
                let mut builder = RollingFileAppender::builder()
                    .rotation(rotation.clone())
                    .filename_prefix(&config.name)
                    .filename_suffix("log");
                if rotation != Rotation::NEVER && config.backup_count > 0 {
                    // the active file counts towards the limit
                    builder = builder.max_log_files(config.backup_count + 1);
                }
                FileAppender::ByTime(builder.build(dir)?)
            }
        };

        Ok(Self {
            level: config.level,
            formatter,
            appender: Mutex::new(appender),
        })
    }
}

#[async_trait]
impl Sink for FileSink {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &LogRecord) {
        let mut line = self.formatter.format(record);
        line.push('\n');
        if let Err(e) = self.appender.lock().write_all(line.as_bytes()) {
            tracing::warn!(target: INTERNAL_TARGET, error = %e, "failed to write log file");
        }
    }

    fn flush(&self) {
        let _ = self.appender.lock().flush();
    }
}

/// Persists records through a background [`BatchWriter`].
///
/// `emit` only copies the record into the writer's bounded queue.
pub struct DatabaseSink {
    level: Level,
    writer: BatchWriter,
}

impl DatabaseSink {
    /// Start a writer for `store`. Must be called within a Tokio runtime.
    pub fn spawn<S>(store: S, config: &PersistenceConfig) -> Result<Self, WriterError>
    where
        S: LogStore + 'static,
    {
        Ok(Self {
            level: config.min_level,
            writer: BatchWriter::spawn(store, config)?,
        })
    }

    pub fn writer(&self) -> &BatchWriter {
        &self.writer
    }
}

#[async_trait]
impl Sink for DatabaseSink {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &LogRecord) {
        self.writer.enqueue(record.clone());
    }

    fn stats(&self) -> Option<WriterStats> {
        Some(self.writer.stats())
    }

    async fn shutdown(&self) -> Result<(), ShutdownError> {
        self.writer.shutdown().await.map(|_| ())
    }
}

use crate::error::ConfigError;
use crate::record::Level;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Well-known environment labels.
pub mod environment {
    pub const DEVELOPMENT: &str = "development";
    pub const STAGING: &str = "staging";
    pub const PRODUCTION: &str = "production";
}

/// Connection and batching parameters for the database sink.
///
/// **Fields**
/// - `host`, `port`, `database`, `user`, `password`: connection target.
/// - `schema`, `table_name`: where rows are inserted (`schema.table_name`).
/// - `ssl_mode`: Postgres SSL mode name (`disable`, `prefer`, `require`, ...).
/// - `queue_capacity`: records buffered before the oldest is dropped.
/// - `batch_size`: records per insert; capped at `queue_capacity`.
/// - `flush_interval`: longest time a partial batch waits before it is
///   written. Given in seconds when deserialized.
/// - `connect_timeout`: bound on a single connection attempt.
/// - `shutdown_timeout`: how long shutdown waits for the writer task.
/// - `min_level`: records below this level are not persisted.
///
/// `Debug` output never shows the password.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    pub table_name: String,
    pub ssl_mode: String,
    pub queue_capacity: usize,
    pub batch_size: usize,
    #[serde(deserialize_with = "duration_from_secs")]
    pub flush_interval: Duration,
    #[serde(deserialize_with = "duration_from_secs")]
    pub connect_timeout: Duration,
    #[serde(deserialize_with = "duration_from_secs")]
    pub shutdown_timeout: Duration,
    pub min_level: Level,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "logs".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            schema: "public".to_string(),
            table_name: "application_logs".to_string(),
            ssl_mode: "prefer".to_string(),
            queue_capacity: 1000,
            batch_size: 10,
            flush_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
            min_level: Level::Debug,
        }
    }
}

impl PersistenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::ZeroFlushInterval);
        }
        Ok(())
    }

    /// Batch threshold actually used by the writer: never larger than the
    /// queue itself.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.min(self.queue_capacity).max(1)
    }

    /// Fully qualified target table, e.g. `public.application_logs`.
    pub fn qualified_table(&self) -> String {
        if self.schema.is_empty() {
            self.table_name.clone()
        } else {
            format!("{}.{}", self.schema, self.table_name)
        }
    }

    /// Libpq-style key/value connection string.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={} sslmode={}",
            self.host, self.port, self.database, self.user, self.password, self.ssl_mode
        )
    }
}

impl fmt::Debug for PersistenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &REDACTED)
            .field("schema", &self.schema)
            .field("table_name", &self.table_name)
            .field("ssl_mode", &self.ssl_mode)
            .field("queue_capacity", &self.queue_capacity)
            .field("batch_size", &self.batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("connect_timeout", &self.connect_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("min_level", &self.min_level)
            .finish()
    }
}

const REDACTED: &str = "<redacted>";

/// DSN with any password replaced, for diagnostics.
pub(crate) fn redact_dsn(dsn: &str) -> String {
    match url::Url::parse(dsn) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some(REDACTED));
            }
            url.to_string()
        }
        Err(_) => REDACTED.to_string(),
    }
}

/// How the file sink rotates its output.
///
/// `Size` keeps writing `<name>.log` and shifts full files to
/// `<name>.log.1`, `<name>.log.2`, ... The time-based variants start a new
/// `<name>.<date>.log` per period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Size,
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl FileRotation {
    /// Equivalent `tracing-appender` schedule, `None` for size rotation.
    pub fn time_schedule(self) -> Option<tracing_appender::rolling::Rotation> {
        use tracing_appender::rolling::Rotation;
        match self {
            FileRotation::Size => None,
            FileRotation::Minutely => Some(Rotation::MINUTELY),
            FileRotation::Hourly => Some(Rotation::HOURLY),
            FileRotation::Daily => Some(Rotation::DAILY),
            FileRotation::Never => Some(Rotation::NEVER),
        }
    }
}

/// Configuration of one logging pipeline.
///
/// `(name, environment)` identifies the pipeline in the
/// [`Registry`](crate::registry::Registry).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub name: String,
    pub level: Level,
    pub environment: String,
    pub log_dir: Option<PathBuf>,
    pub console_output: bool,
    pub file_output: bool,
    pub rotate_logs: bool,
    pub rotation: FileRotation,
    /// Size that triggers rotation under [`FileRotation::Size`].
    pub max_bytes: usize,
    pub backup_count: usize,
    pub json_format: bool,
    pub mask_sensitive: bool,
    pub extra_mask_patterns: Vec<String>,
    pub database: Option<PersistenceConfig>,
    /// Store DSN (`postgres://...`, `clickhouse://...`). Takes precedence
    /// over the connection fields of `database`, whose batching settings
    /// still apply.
    pub sink_dsn: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            level: Level::Info,
            environment: environment::DEVELOPMENT.to_string(),
            log_dir: None,
            console_output: true,
            file_output: true,
            rotate_logs: true,
            rotation: FileRotation::Size,
            max_bytes: 10 * 1024 * 1024,
            backup_count: 5,
            json_format: false,
            mask_sensitive: true,
            extra_mask_patterns: Vec::new(),
            database: None,
            sink_dsn: None,
        }
    }
}

impl fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConfig")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("environment", &self.environment)
            .field("log_dir", &self.log_dir)
            .field("console_output", &self.console_output)
            .field("file_output", &self.file_output)
            .field("rotate_logs", &self.rotate_logs)
            .field("rotation", &self.rotation)
            .field("max_bytes", &self.max_bytes)
            .field("backup_count", &self.backup_count)
            .field("json_format", &self.json_format)
            .field("mask_sensitive", &self.mask_sensitive)
            .field("extra_mask_patterns", &self.extra_mask_patterns)
            .field("database", &self.database)
            .field("sink_dsn", &self.sink_dsn.as_deref().map(redact_dsn))
            .finish()
    }
}

impl LogConfig {
    pub fn new(name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: environment.into(),
            ..Self::default()
        }
    }

    pub fn log_dir_or_default(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("logs"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "name".to_string(),
                value: String::new(),
            });
        }
        match &self.database {
            Some(db) => db.validate(),
            None => Ok(()),
        }
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

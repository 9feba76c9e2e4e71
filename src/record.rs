use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered severity of a [`LogRecord`].
///
/// Discriminants match the conventional numeric levels so they can be
/// compared and stored as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[serde(alias = "debug")]
    Debug = 10,
    #[serde(alias = "info")]
    Info = 20,
    #[serde(alias = "warning", alias = "WARN", alias = "warn")]
    Warning = 30,
    #[serde(alias = "error")]
    Error = 40,
    #[serde(alias = "critical")]
    Critical = 50,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    /// Upper-case severity name, e.g. `"WARNING"`.
    pub fn name(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a level name, falling back to `Info` for unknown input.
    pub fn parse_or_info(name: &str) -> Level {
        name.parse().unwrap_or(Level::Info)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" | "FATAL" => Ok(Level::Critical),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Best-effort location of the call site that produced a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub module: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
}

/// Execution context captured on the emitting thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadContext {
    pub thread_id: u64,
    pub thread_name: Option<String>,
    pub process_id: u32,
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

impl ThreadContext {
    /// Capture the calling thread's context.
    ///
    /// `thread_id` is a process-unique number assigned on first use per
    /// thread, since `std::thread::ThreadId` has no stable integer form.
    pub fn current() -> Self {
        let thread = std::thread::current();
        ThreadContext {
            thread_id: THREAD_ID.with(|id| *id),
            thread_name: thread.name().map(str::to_string),
            process_id: std::process::id(),
        }
    }
}

/// Normalized log record flowing from a call site through the pipeline.
///
/// Records are built on the caller's thread. Filters may adjust the
/// message or environment before dispatch; the database sink keeps its
/// own copy, which is never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger_name: String,
    pub message: String,
    pub location: SourceLocation,
    pub thread: ThreadContext,
    pub exception: Option<String>,
    pub extra_fields: BTreeMap<String, serde_json::Value>,
    pub environment: Option<String>,
}

impl LogRecord {
    pub fn new(level: Level, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            message: message.into(),
            location: SourceLocation::default(),
            thread: ThreadContext::current(),
            exception: None,
            extra_fields: BTreeMap::new(),
            environment: None,
        }
    }

    pub fn builder(level: Level, message: impl Into<String>) -> RecordBuilder {
        RecordBuilder::new(level, message)
    }
}

/// Optional parts of a record supplied at a call site.
///
/// The logger name is filled in by the [`Logger`](crate::manager::Logger)
/// the builder is handed to.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    level: Level,
    message: String,
    location: SourceLocation,
    exception: Option<String>,
    extra_fields: BTreeMap<String, serde_json::Value>,
}

impl RecordBuilder {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        RecordBuilder {
            level,
            message: message.into(),
            location: SourceLocation::default(),
            exception: None,
            extra_fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    pub fn fields<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        self.extra_fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn exception(mut self, text: impl Into<String>) -> Self {
        self.exception = Some(text.into());
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.location.module = Some(module.into());
        self
    }

    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.location.function = Some(function.into());
        self
    }

    pub fn line(mut self, line: u32) -> Self {
        self.location.line = Some(line);
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn build(self, logger_name: impl Into<String>) -> LogRecord {
        let mut record = LogRecord::new(self.level, logger_name, self.message);
        record.location = self.location;
        record.exception = self.exception;
        record.extra_fields = self.extra_fields;
        record
    }
}

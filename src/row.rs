use crate::record::LogRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Column names of the persisted row, in insertion order.
pub const COLUMNS: [&str; 14] = [
    "timestamp",
    "level",
    "logger_name",
    "message",
    "module",
    "function",
    "line_number",
    "thread_id",
    "thread_name",
    "process_id",
    "exception",
    "extra_data",
    "environment",
    "hostname",
];

/// Stored in `extra_data` when a record's extra fields cannot be encoded.
pub const UNSERIALIZABLE_EXTRA: &str = r#"{"_error":"unserializable extra fields"}"#;

/// One row of the relational log table.
///
/// Field order matches [`COLUMNS`]. `exception`, `extra_data`,
/// `environment` and `hostname` are nullable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub logger_name: String,
    pub message: String,
    pub module: Option<String>,
    pub function: Option<String>,
    pub line_number: Option<i32>,
    pub thread_id: i64,
    pub thread_name: Option<String>,
    pub process_id: i32,
    pub exception: Option<String>,
    /// Extra fields as JSON text; `None` when the record carried none.
    pub extra_data: Option<String>,
    pub environment: Option<String>,
    pub hostname: Option<String>,
}

impl LogRow {
    /// Map a record to a row. `hostname` is resolved by the caller at
    /// write time, not at capture time.
    pub fn from_record(record: &LogRecord, hostname: Option<&str>) -> Self {
        let extra_data = if record.extra_fields.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&record.extra_fields)
                    .unwrap_or_else(|_| UNSERIALIZABLE_EXTRA.to_string()),
            )
        };

        LogRow {
            timestamp: record.timestamp,
            level: record.level.name().to_string(),
            logger_name: record.logger_name.clone(),
            message: record.message.clone(),
            module: record.location.module.clone(),
            function: record.location.function.clone(),
            line_number: record.location.line.map(|l| l as i32),
            thread_id: record.thread.thread_id as i64,
            thread_name: record.thread.thread_name.clone(),
            process_id: record.thread.process_id as i32,
            exception: record.exception.clone(),
            extra_data,
            environment: record.environment.clone(),
            hostname: hostname.map(str::to_string),
        }
    }
}

/// Resolve the local host name, if the platform reports one.
pub fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Map a whole batch, resolving the host name once.
pub fn rows_for_batch(batch: &[LogRecord]) -> Vec<LogRow> {
    let host = local_hostname();
    batch
        .iter()
        .map(|record| LogRow::from_record(record, host.as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Level, RecordBuilder};
    use std::collections::BTreeMap;

    #[test]
    fn empty_extra_fields_map_to_null() {
        let record = LogRecord::new(Level::Info, "app", "hello");
        let row = LogRow::from_record(&record, Some("host-1"));
        assert_eq!(row.extra_data, None);
        assert_eq!(row.hostname.as_deref(), Some("host-1"));
        assert_eq!(row.level, "INFO");
    }

    #[test]
    fn extra_fields_survive_the_structured_column() {
        let record = RecordBuilder::new(Level::Info, "login")
            .field("user_id", 123)
            .field("action", "login")
            .build("app.auth");

        let row = LogRow::from_record(&record, None);
        let parsed: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(row.extra_data.as_deref().unwrap()).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["user_id"], serde_json::json!(123));
        assert_eq!(parsed["action"], serde_json::json!("login"));
    }

    #[test]
    fn row_copies_context_and_location() {
        let mut record = RecordBuilder::new(Level::Error, "failed")
            .module("billing")
            .function("charge")
            .line(7)
            .exception("Traceback")
            .build("app.billing");
        record.environment = Some("production".into());

        let row = LogRow::from_record(&record, None);
        assert_eq!(row.module.as_deref(), Some("billing"));
        assert_eq!(row.function.as_deref(), Some("charge"));
        assert_eq!(row.line_number, Some(7));
        assert_eq!(row.exception.as_deref(), Some("Traceback"));
        assert_eq!(row.environment.as_deref(), Some("production"));
        assert_eq!(row.process_id as u32, std::process::id());
        assert_eq!(row.thread_id as u64, record.thread.thread_id);
    }

    #[test]
    fn serialized_row_has_every_column() {
        let record = LogRecord::new(Level::Debug, "app", "x");
        let value = serde_json::to_value(LogRow::from_record(&record, None)).unwrap();
        let mut actual: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let mut expected = COLUMNS.to_vec();
        expected.sort_unstable();
        actual.sort_unstable();
        assert_eq!(actual, expected);
    }
}

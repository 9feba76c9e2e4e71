use crate::record::{Level, LogRecord};
use colored::{Color, Colorize};
use serde_json::{Map, Value};

/// Turns a record into one line (or block) of text for a text sink.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn location(record: &LogRecord) -> String {
    let loc = &record.location;
    format!(
        "{}.{}:{}",
        loc.module.as_deref().unwrap_or("-"),
        loc.function.as_deref().unwrap_or("-"),
        loc.line.unwrap_or(0)
    )
}

fn with_exception(mut line: String, record: &LogRecord) -> String {
    if let Some(exception) = &record.exception {
        line.push('\n');
        line.push_str(exception);
    }
    line
}

/// Which columns a [`TextFormatter`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLayout {
    /// `LEVEL | time | env | logger | message`
    Console,
    /// `time | LEVEL | env | logger | module.function:line | message`
    File,
}

/// Plain, uncolored text.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatter {
    layout: TextLayout,
}

impl TextFormatter {
    pub fn new(layout: TextLayout) -> Self {
        Self { layout }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let time = record.timestamp.format(TIME_FORMAT);
        let env = record.environment.as_deref().unwrap_or("-");
        let line = match self.layout {
            TextLayout::Console => format!(
                "{} | {} | {} | {} | {}",
                record.level, time, env, record.logger_name, record.message
            ),
            TextLayout::File => format!(
                "{} | {} | {} | {} | {} | {}",
                time,
                record.level,
                env,
                record.logger_name,
                location(record),
                record.message
            ),
        };
        with_exception(line, record)
    }
}

/// Console formatter that colors the severity name by level.
///
/// The colored name only exists inside the returned string; the record
/// itself is untouched, so other sinks formatting the same record see the
/// plain severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColoredFormatter;

impl ColoredFormatter {
    pub fn color_for(level: Level) -> Color {
        match level {
            Level::Debug => Color::Cyan,
            Level::Info => Color::Green,
            Level::Warning => Color::Yellow,
            Level::Error => Color::Red,
            Level::Critical => Color::Magenta,
        }
    }
}

impl Formatter for ColoredFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let level = record.level.name().color(Self::color_for(record.level));
        let line = format!(
            "{} | {} | {} | {} | {}",
            level,
            record.timestamp.format(TIME_FORMAT),
            record.logger_name,
            location(record),
            record.message
        );
        with_exception(line, record)
    }
}

/// Keys written by [`JsonFormatter`] itself.
pub const RESERVED_JSON_KEYS: &[&str] = &[
    "timestamp",
    "level",
    "logger",
    "message",
    "module",
    "function",
    "line",
    "exception",
    "environment",
    "extra",
];

/// One JSON object per record.
///
/// Extra fields are merged at the top level. A field whose key collides
/// with one of [`RESERVED_JSON_KEYS`] is moved under a nested `"extra"`
/// object instead of overwriting the built-in value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn to_value(&self, record: &LogRecord) -> Value {
        let mut object = Map::new();
        object.insert("timestamp".into(), Value::String(record.timestamp.to_rfc3339()));
        object.insert("level".into(), Value::String(record.level.name().into()));
        object.insert("logger".into(), Value::String(record.logger_name.clone()));
        object.insert("message".into(), Value::String(record.message.clone()));
        object.insert("module".into(), opt_string(&record.location.module));
        object.insert("function".into(), opt_string(&record.location.function));
        object.insert(
            "line".into(),
            record.location.line.map(Value::from).unwrap_or(Value::Null),
        );
        if let Some(exception) = &record.exception {
            object.insert("exception".into(), Value::String(exception.clone()));
        }
        if let Some(environment) = &record.environment {
            object.insert("environment".into(), Value::String(environment.clone()));
        }

        let mut colliding = Map::new();
        for (key, value) in &record.extra_fields {
            if RESERVED_JSON_KEYS.contains(&key.as_str()) {
                colliding.insert(key.clone(), value.clone());
            } else {
                object.insert(key.clone(), value.clone());
            }
        }
        if !colliding.is_empty() {
            object.insert("extra".into(), Value::Object(colliding));
        }

        Value::Object(object)
    }
}

fn opt_string(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        self.to_value(record).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuilder;

    fn sample() -> LogRecord {
        let mut record = RecordBuilder::new(Level::Error, "payment failed")
            .module("billing")
            .function("charge")
            .line(12)
            .field("user_id", 123)
            .field("action", "login")
            .build("app.billing");
        record.environment = Some("production".into());
        record
    }

    #[test]
    fn colored_output_does_not_leak_into_other_formatters() {
        // stdout is not a terminal under the test harness
        colored::control::set_override(true);

        let record = sample();
        let plain_before = TextFormatter::new(TextLayout::Console).format(&record);
        let colored = ColoredFormatter.format(&record);
        let plain_after = TextFormatter::new(TextLayout::Console).format(&record);

        assert!(colored.contains("ERROR"));
        assert!(colored.contains("\u{1b}["));
        assert_eq!(plain_before, plain_after);
        assert!(plain_after.starts_with("ERROR | "));
        assert!(!plain_after.contains('\u{1b}'));
        assert_eq!(record.level.name(), "ERROR");
    }

    #[test]
    fn file_layout_includes_location_and_environment() {
        let line = TextFormatter::new(TextLayout::File).format(&sample());
        assert!(line.contains("| ERROR | production | app.billing | billing.charge:12 | payment failed"));
    }

    #[test]
    fn text_appends_exception_block() {
        let mut record = sample();
        record.exception = Some("Traceback: boom".into());
        let line = TextFormatter::new(TextLayout::Console).format(&record);
        assert!(line.ends_with("\nTraceback: boom"));
    }

    #[test]
    fn json_contains_fixed_and_extra_fields() {
        let value: Value = serde_json::from_str(&JsonFormatter.format(&sample())).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["logger"], "app.billing");
        assert_eq!(value["message"], "payment failed");
        assert_eq!(value["module"], "billing");
        assert_eq!(value["line"], 12);
        assert_eq!(value["environment"], "production");
        assert_eq!(value["user_id"], 123);
        assert_eq!(value["action"], "login");
        assert!(value.get("exception").is_none());
        assert!(value.get("extra").is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn json_does_not_let_extra_fields_overwrite_reserved_keys() {
        let mut record = sample();
        record
            .extra_fields
            .insert("level".into(), Value::String("DEBUG".into()));
        let value = JsonFormatter.to_value(&record);
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["extra"]["level"], "DEBUG");
        assert_eq!(value["user_id"], 123);
    }
}

use crate::manager::Pipeline;
use crate::record::{Level, LogRecord};
use crate::CRATE_TARGET;
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// dispatches them through a [`Pipeline`].
///
/// The event target becomes the logger name, the `message` field the
/// record message, an `exception` field the exception text, and every
/// other field lands in `extra_fields`. Events emitted by this crate are
/// ignored so that writer diagnostics never loop back into the pipeline.
pub struct PipelineLayer {
    pipeline: Arc<Pipeline>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events converted and handed to the pipeline.
    pub dispatched_events: Arc<AtomicU64>,
}

impl PipelineLayer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            total_events: Arc::new(AtomicU64::new(0)),
            dispatched_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if meta.target().starts_with(CRATE_TARGET) {
            return;
        }
        let level = Level::from(meta.level());
        if level < self.pipeline.level() {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut exception: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
            exception: &mut exception,
        };
        event.record(&mut visitor);

        let mut record = LogRecord::new(level, meta.target(), message.unwrap_or_default());
        record.location.module = meta.module_path().map(str::to_string);
        record.location.line = meta.line();
        record.exception = exception;
        record.extra_fields = fields;

        self.pipeline.dispatch(record);
        self.dispatched_events.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
    pub exception: &'a mut Option<String>,
}

impl FieldVisitor<'_> {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => *self.message = Some(value.to_string()),
            "exception" => *self.exception = Some(value.to_string()),
            _ => self.insert(field, serde_json::Value::String(value.to_string())),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let text = crate::trace::error_chain(value);
        if field.name() == "exception" {
            *self.exception = Some(text);
        } else {
            self.insert(field, serde_json::Value::String(text));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            // `format_args!` messages arrive through `record_debug`
            "message" => *self.message = Some(format!("{:?}", value)),
            "exception" => *self.exception = Some(format!("{:?}", value)),
            _ => self.insert(field, serde_json::Value::String(format!("{:?}", value))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Sink;
    use parking_lot::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct Collect(Mutex<Vec<LogRecord>>);

    impl Sink for Collect {
        fn level(&self) -> Level {
            Level::Debug
        }

        fn emit(&self, record: &LogRecord) {
            self.0.lock().push(record.clone());
        }
    }

    fn setup(level: Level) -> (PipelineLayer, Arc<Collect>) {
        let pipeline = Arc::new(Pipeline::new(level, Vec::new()));
        let sink = Arc::new(Collect::default());
        pipeline.add_sink(sink.clone());
        (PipelineLayer::new(pipeline), sink)
    }

    #[test]
    fn events_become_records() {
        let (layer, sink) = setup(Level::Debug);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app.orders", order_id = 123, user = "bob", "order {} failed", 123);
        });

        let records = sink.0.lock();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, Level::Error);
        assert_eq!(record.logger_name, "app.orders");
        assert_eq!(record.message, "order 123 failed");
        assert_eq!(record.extra_fields["order_id"], serde_json::json!(123));
        assert_eq!(record.extra_fields["user"], serde_json::json!("bob"));
        assert!(record.location.line.is_some());
    }

    #[test]
    fn events_below_pipeline_level_are_skipped() {
        let (layer, sink) = setup(Level::Warning);
        let total = Arc::clone(&layer.total_events);
        let dispatched = Arc::clone(&layer.dispatched_events);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app", "ignored");
            tracing::warn!(target: "app", "kept");
        });

        assert_eq!(sink.0.lock().len(), 1);
        assert_eq!(sink.0.lock()[0].level, Level::Warning);
        assert_eq!(total.load(Ordering::Relaxed), 2);
        assert_eq!(dispatched.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn own_diagnostics_are_not_dispatched() {
        let (layer, sink) = setup(Level::Debug);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: crate::INTERNAL_TARGET, "store unreachable");
        });

        assert!(sink.0.lock().is_empty());
    }

    #[test]
    fn exception_field_is_lifted() {
        let (layer, sink) = setup(Level::Debug);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app", exception = "Traceback: boom", "crashed");
        });

        let records = sink.0.lock();
        assert_eq!(records[0].exception.as_deref(), Some("Traceback: boom"));
        assert!(!records[0].extra_fields.contains_key("exception"));
    }
}

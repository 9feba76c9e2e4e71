//! Explicit call-tracing wrappers.
//!
//! Each wrapper logs entry, completion (with duration) and failure of a
//! closure through a [`Logger`], then returns the closure's result
//! untouched. Errors are logged and handed back to the caller as-is.

use crate::manager::Logger;
use crate::record::{Level, RecordBuilder};
use std::error::Error;
use std::fmt::{Display, Write};
use std::future::Future;
use std::time::Instant;

/// Render an error followed by its `source()` chain, one cause per line.
pub fn error_chain<E: Error + ?Sized>(error: &E) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(text, "\nCaused by: {cause}");
        source = cause.source();
    }
    text
}

fn log_entry(logger: &Logger, level: Level, function: &str) {
    logger.log_with(
        RecordBuilder::new(level, format!("calling {function}")).field("function", function),
    );
}

fn log_outcome<T, E: Display>(
    logger: &Logger,
    level: Level,
    function: &str,
    started: Instant,
    result: &Result<T, E>,
) {
    let duration = started.elapsed().as_secs_f64();
    match result {
        Ok(_) => logger.log_with(
            RecordBuilder::new(level, format!("{function} completed in {duration:.3}s"))
                .field("function", function)
                .field("duration_seconds", (duration * 1000.0).round() / 1000.0),
        ),
        Err(e) => logger.log_with(
            RecordBuilder::new(Level::Error, format!("error in {function}: {e}"))
                .field("function", function)
                .field("exception_type", std::any::type_name::<E>())
                .exception(e.to_string()),
        ),
    }
}

/// Run `f`, logging entry and completion at `level` and failure at ERROR.
///
/// ```
/// # use tracing_log_pipeline::manager::{Logger, Pipeline};
/// # use tracing_log_pipeline::record::Level;
/// # use tracing_log_pipeline::trace::log_call;
/// # use std::sync::Arc;
/// let logger = Logger::new("app.math", Arc::new(Pipeline::new(Level::Debug, Vec::new())));
/// let sum: Result<i32, std::num::ParseIntError> =
///     log_call(&logger, Level::Debug, "parse_sum", || Ok("2".parse::<i32>()? + 3));
/// assert_eq!(sum, Ok(5));
/// ```
pub fn log_call<T, E, F>(logger: &Logger, level: Level, function: &str, f: F) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    log_entry(logger, level, function);
    let started = Instant::now();
    let result = f();
    log_outcome(logger, level, function, started, &result);
    result
}

/// Async counterpart of [`log_call`].
pub async fn log_call_async<T, E, Fut>(
    logger: &Logger,
    level: Level,
    function: &str,
    fut: Fut,
) -> Result<T, E>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    log_entry(logger, level, function);
    let started = Instant::now();
    let result = fut.await;
    log_outcome(logger, level, function, started, &result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::Pipeline;
    use crate::record::LogRecord;
    use crate::sink::Sink;
    use parking_lot::Mutex;
    use std::sync::Arc;

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

    fn logger() -> (Logger, Arc<Collect>) {
        let pipeline = Arc::new(Pipeline::new(Level::Debug, Vec::new()));
        let sink = Arc::new(Collect::default());
        pipeline.add_sink(sink.clone());
        (Logger::new("app.calc", pipeline), sink)
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("division by zero")]
    struct DivByZero;

    fn divide(a: i32, b: i32) -> Result<i32, DivByZero> {
        if b == 0 {
            Err(DivByZero)
        } else {
            Ok(a / b)
        }
    }

    #[test]
    fn success_logs_entry_and_completion() {
        let (logger, sink) = logger();
        let out = log_call(&logger, Level::Info, "divide", || divide(6, 3));
        assert_eq!(out, Ok(2));

        let records = sink.0.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "calling divide");
        assert!(records[1].message.starts_with("divide completed in"));
        assert!(records[1].extra_fields.contains_key("duration_seconds"));
        assert_eq!(records[1].level, Level::Info);
    }

    #[test]
    fn failure_is_logged_and_returned_unchanged() {
        let (logger, sink) = logger();
        let out = log_call(&logger, Level::Debug, "divide", || divide(1, 0));
        assert_eq!(out, Err(DivByZero));

        let records = sink.0.lock();
        let last = records.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.message, "error in divide: division by zero");
        assert!(last.extra_fields["exception_type"]
            .as_str()
            .unwrap()
            .ends_with("DivByZero"));
    }

    #[tokio::test]
    async fn async_wrapper_behaves_the_same() {
        let (logger, sink) = logger();
        let out = log_call_async(&logger, Level::Debug, "fetch", async { divide(8, 2) }).await;
        assert_eq!(out, Ok(4));
        assert_eq!(sink.0.lock().len(), 2);
    }

    #[test]
    fn error_chain_lists_causes() {
        #[derive(Debug, thiserror::Error)]
        #[error("request failed")]
        struct Request(#[source] DivByZero);

        let text = error_chain(&Request(DivByZero));
        assert_eq!(text, "request failed\nCaused by: division by zero");
    }
}

use tracing_log_pipeline::init::initialize_logging;
use tracing_log_pipeline::record::{Level, RecordBuilder};
use tracing_log_pipeline::trace::log_call;
use tracing_log_pipeline::{LogConfig, PersistenceConfig};

#[tokio::main]
async fn main() {
    let config = LogConfig {
        level: Level::Debug,
        file_output: false,
        database: Some(PersistenceConfig {
            host: "127.0.0.1".into(),
            database: "logs".into(),
            user: "postgres".into(),
            password: "postgres".into(),
            ..PersistenceConfig::default()
        }),
        ..LogConfig::new("billing", "staging")
    };

    let manager = match initialize_logging(config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return;
        }
    };

    let logger = manager.get_logger(Some("invoices"));
    logger.info("service started");
    logger.log_with(
        RecordBuilder::new(Level::Warning, "invoice overdue")
            .field("invoice_id", 1042)
            .field("days_late", 12),
    );

    let parsed = log_call(&logger, Level::Debug, "parse_amount", || "12.50".parse::<f64>());
    if let Err(e) = &parsed {
        manager.log_exception(&logger, e, "could not parse amount");
    }

    // Masked before it reaches any sink.
    logger.info("retrying with api_key=sk_live_abc123");

    if let Err(e) = manager.shutdown().await {
        eprintln!("shutdown failed: {e}");
    }
    println!("{:?}", manager.statistics());
}

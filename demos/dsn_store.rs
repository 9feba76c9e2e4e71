use tracing::{error, info};

use tracing_log_pipeline::env::{env_or, LOG_SINK_DSN_ENV};
use tracing_log_pipeline::init::init_tracing;
use tracing_log_pipeline::{LogConfig, LoggerManager, PersistenceConfig};

/// Pick the store from a single DSN, e.g.
/// `LOG_SINK_DSN=clickhouse://default@127.0.0.1:8123/default/app_logs`.
#[tokio::main]
async fn main() {
    let dsn = env_or(
        LOG_SINK_DSN_ENV,
        "postgres://postgres@127.0.0.1:5432/logs?table=public.application_logs",
    );

    let config = LogConfig {
        file_output: false,
        database: Some(PersistenceConfig::default()),
        sink_dsn: Some(dsn),
        ..LogConfig::new("gateway", "production")
    };
    println!("{config:?}");

    let manager = match LoggerManager::new(config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("cannot use {LOG_SINK_DSN_ENV}: {e}");
            return;
        }
    };
    init_tracing(&manager).expect("subscriber already installed");

    info!("starting service");
    error!(user_id = 42, reason = "invalid password", "authentication failed");

    if let Err(e) = manager.shutdown().await {
        eprintln!("shutdown failed: {e}");
    }
}

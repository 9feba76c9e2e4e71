use std::time::Instant;
use tracing::error;

use tracing_log_pipeline::init::init_tracing;
use tracing_log_pipeline::noop_store::NoopStore;
use tracing_log_pipeline::{LogConfig, LoggerManager, PersistenceConfig};

#[tokio::main]
async fn main() {
    let config = LogConfig {
        console_output: false,
        file_output: false,
        database: Some(PersistenceConfig::default()),
        ..LogConfig::new("load", "production")
    };
    let manager = LoggerManager::with_store(config, Box::new(NoopStore))
        .expect("failed to build pipeline");
    init_tracing(&manager).expect("subscriber already installed");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!(
        "noop store: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    if let Err(e) = manager.shutdown().await {
        eprintln!("shutdown failed: {e}");
    }
    println!("{:?}", manager.statistics());
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing_log_pipeline::error::StoreError;
use tracing_log_pipeline::row::LogRow;
use tracing_log_pipeline::store::LogStore;
use tracing_log_pipeline::{LogConfig, LoggerManager, PersistenceConfig};

/// Store that only counts rows and pretends each insert takes a while,
/// so the queue fills up and starts evicting.
struct SlowCountingStore {
    rows: Arc<AtomicU64>,
}

#[async_trait]
impl LogStore for SlowCountingStore {
    async fn connect(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_batch(&mut self, rows: &[LogRow]) -> Result<(), StoreError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.rows.fetch_add(rows.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn describe(&self) -> String {
        "slow counter".to_string()
    }
}

#[tokio::main]
async fn main() {
    let rows = Arc::new(AtomicU64::new(0));
    let config = LogConfig {
        console_output: false,
        file_output: false,
        database: Some(PersistenceConfig {
            queue_capacity: 5_000,
            batch_size: 500,
            flush_interval: Duration::from_millis(200),
            ..PersistenceConfig::default()
        }),
        ..LogConfig::new("load", "production")
    };
    let store = SlowCountingStore { rows: Arc::clone(&rows) };
    let manager =
        LoggerManager::with_store(config, Box::new(store)).expect("failed to build pipeline");
    let logger = manager.get_logger(Some("worker"));

    let n: u64 = 100_000;
    let start = Instant::now();
    for i in 0..n {
        logger.error(format!("custom load test error {i}"));
    }
    let elapsed = start.elapsed();

    if let Err(e) = manager.shutdown().await {
        eprintln!("shutdown failed: {e}");
    }
    let stats = manager.statistics().unwrap_or_default();
    println!(
        "sent {} records in {:?}; stored {}, evicted {}, failed {}",
        n,
        elapsed,
        rows.load(Ordering::Relaxed),
        stats.dropped,
        stats.failed
    );
}

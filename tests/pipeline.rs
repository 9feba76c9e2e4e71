use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::layer::SubscriberExt;

use tracing_log_pipeline::error::StoreError;
use tracing_log_pipeline::filter::MASK;
use tracing_log_pipeline::layer::PipelineLayer;
use tracing_log_pipeline::record::{Level, RecordBuilder};
use tracing_log_pipeline::row::LogRow;
use tracing_log_pipeline::store::LogStore;
use tracing_log_pipeline::{LogConfig, LoggerManager, PersistenceConfig, Registry};

/// Store that keeps every committed row in memory.
#[derive(Clone, Default)]
struct MemoryStore {
    rows: Arc<Mutex<Vec<LogRow>>>,
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn connect(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_batch(&mut self, rows: &[LogRow]) -> Result<(), StoreError> {
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }
}

/// Store whose destination is never reachable.
struct DownStore;

#[async_trait]
impl LogStore for DownStore {
    async fn connect(&mut self) -> Result<(), StoreError> {
        Err(StoreError::Connect("connection refused".into()))
    }

    async fn insert_batch(&mut self, _rows: &[LogRow]) -> Result<(), StoreError> {
        Err(StoreError::NotConnected)
    }
}

fn config(name: &str, env: &str) -> LogConfig {
    LogConfig {
        level: Level::Debug,
        console_output: false,
        file_output: false,
        database: Some(PersistenceConfig {
            flush_interval: Duration::from_millis(50),
            ..PersistenceConfig::default()
        }),
        ..LogConfig::new(name, env)
    }
}

#[tokio::test]
async fn records_reach_the_store_enriched_and_masked() {
    let store = MemoryStore::default();
    let manager = LoggerManager::with_store(config("orders", "staging"), Box::new(store.clone()))
        .unwrap();

    let logger = manager.get_logger(Some("checkout"));
    logger.log_with(
        RecordBuilder::new(Level::Warning, "payment retried with token=abc123")
            .field("user_id", 7)
            .field("action", "retry"),
    );
    logger.debug("cart loaded");

    manager.shutdown().await.unwrap();

    let rows = store.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    assert_eq!(first.level, "WARNING");
    assert_eq!(first.logger_name, "orders.checkout");
    assert!(!first.message.contains("abc123"));
    assert!(first.message.contains(MASK));
    assert_eq!(first.environment.as_deref(), Some("staging"));

    let extra: serde_json::Value =
        serde_json::from_str(first.extra_data.as_deref().unwrap()).unwrap();
    assert_eq!(extra["user_id"], 7);
    assert_eq!(extra["action"], "retry");

    assert_eq!(rows[1].message, "cart loaded");
    assert!(rows[1].extra_data.is_none());

    let stats = manager.statistics().unwrap();
    assert_eq!(stats.written, 2);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn unreachable_store_never_surfaces_to_callers() {
    let manager = LoggerManager::with_store(config("orders", "production"), Box::new(DownStore))
        .unwrap();

    let logger = manager.get_logger(None);
    for i in 0..3 {
        logger.error(format!("failure {i}"));
    }

    manager.shutdown().await.unwrap();

    let stats = manager.statistics().unwrap();
    assert_eq!(stats.written, 0);
    assert_eq!(stats.failed, 3);
    assert!(!stats.connected);
}

#[tokio::test]
async fn tracing_events_flow_into_the_store() {
    let store = MemoryStore::default();
    let manager = LoggerManager::with_store(config("gateway", "production"), Box::new(store.clone()))
        .unwrap();

    let layer = PipelineLayer::new(manager.pipeline());
    let dispatched = Arc::clone(&layer.dispatched_events);
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(user_id = 42, reason = "invalid password", "authentication failed");
        tracing::info!(attempt = 2, "login attempt with password=hunter2");
    });

    manager.shutdown().await.unwrap();
    assert_eq!(dispatched.load(std::sync::atomic::Ordering::Relaxed), 2);

    let rows = store.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].level, "ERROR");
    assert_eq!(rows[0].message, "authentication failed");
    let extra: serde_json::Value =
        serde_json::from_str(rows[0].extra_data.as_deref().unwrap()).unwrap();
    assert_eq!(extra["user_id"], 42);
    assert_eq!(extra["reason"], "invalid password");

    assert_eq!(rows[1].level, "INFO");
    assert_eq!(rows[1].message, format!("login attempt with password={MASK}"));
}

#[tokio::test]
async fn registry_shares_one_manager_per_identity() {
    let registry = Registry::new();
    let store = MemoryStore::default();

    let build = |config: LogConfig| LoggerManager::with_store(config, Box::new(store.clone()));
    let first = registry.get_or_init_with(config("billing", "production"), build).unwrap();
    let again = registry.get_or_init_with(config("billing", "production"), build).unwrap();
    let staging = registry.get_or_init_with(config("billing", "staging"), build).unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &staging));
    assert_eq!(registry.len(), 2);

    first.get_logger(None).info("from production");
    staging.get_logger(None).info("from staging");

    let managers = registry.reset();
    assert!(registry.is_empty());
    for manager in managers {
        manager.shutdown().await.unwrap();
    }

    let rows = store.rows.lock().unwrap();
    let mut environments: Vec<_> = rows
        .iter()
        .filter_map(|r| r.environment.clone())
        .collect();
    environments.sort();
    assert_eq!(environments, vec!["production", "staging"]);
}

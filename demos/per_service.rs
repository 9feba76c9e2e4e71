use tracing_log_pipeline::registry::Registry;
use tracing_log_pipeline::LogConfig;

/// Two services in one process, each with its own pipeline. Asking the
/// registry again for the same `(name, environment)` hands back the
/// existing manager.
#[tokio::main]
async fn main() {
    let registry = Registry::new();

    let quiet = |name: &str| LogConfig {
        file_output: false,
        ..LogConfig::new(name, "development")
    };

    let auth = registry.get_or_init(quiet("auth")).expect("auth pipeline");
    let payments = registry.get_or_init(quiet("payments")).expect("payments pipeline");
    let auth_again = registry.get_or_init(quiet("auth")).expect("auth pipeline");
    assert!(std::sync::Arc::ptr_eq(&auth, &auth_again));

    auth.get_logger(Some("login")).warning("invalid password for user 42");
    payments.get_logger(None).error("card declined");

    for manager in registry.reset() {
        if let Err(e) = manager.shutdown().await {
            eprintln!("shutdown failed: {e}");
        }
    }
}

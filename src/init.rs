use crate::config::LogConfig;
use crate::error::PipelineError;
use crate::layer::PipelineLayer;
use crate::manager::LoggerManager;
use crate::registry::Registry;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry as SubscriberRegistry;

/// Options for installing the pipeline as the global `tracing` subscriber.
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is
///   stacked on top of [`PipelineLayer`], which also makes the pipeline's
///   own diagnostics visible on stdout.
#[derive(Clone, Debug, Default)]
pub struct LayerConfig {
    pub enable_stdout: bool,
}

/// Install a global `tracing` subscriber that feeds every event into
/// `manager`'s pipeline.
///
/// **Errors**
///
/// Returns `Err` if a global default subscriber has already been set.
pub fn init_tracing_with_config(
    manager: &LoggerManager,
    config: LayerConfig,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let layer = PipelineLayer::new(manager.pipeline());

    // Two branches because the stacked subscriber types differ.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = SubscriberRegistry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = SubscriberRegistry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Install the pipeline with [`LayerConfig::default`].
pub fn init_tracing(
    manager: &LoggerManager,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    init_tracing_with_config(manager, LayerConfig::default())
}

/// Register (or reuse) the pipeline for `config` in the global
/// [`Registry`].
///
/// Must be called inside a Tokio runtime when `config.database` is set.
pub fn initialize_logging(config: LogConfig) -> Result<Arc<LoggerManager>, PipelineError> {
    Registry::global().get_or_init(config)
}

/// [`initialize_logging`] with configuration read from `LOG_*` variables.
pub fn initialize_from_env() -> Result<Arc<LoggerManager>, PipelineError> {
    initialize_logging(LogConfig::from_env()?)
}

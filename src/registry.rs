use crate::config::LogConfig;
use crate::error::PipelineError;
use crate::manager::LoggerManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// `(application name, environment)` key of a pipeline.
pub type Identity = (String, String);

/// Maps each `(application, environment)` pair to one shared
/// [`LoggerManager`].
///
/// Tests create their own `Registry`; applications usually go through
/// [`Registry::global`]. Nothing is registered implicitly.
#[derive(Default)]
pub struct Registry {
    managers: Mutex<HashMap<Identity, Arc<LoggerManager>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Return the manager registered for `config`'s identity, building and
    /// registering it first if there is none.
    ///
    /// When a manager already exists the rest of `config` is ignored.
    pub fn get_or_init(&self, config: LogConfig) -> Result<Arc<LoggerManager>, PipelineError> {
        self.get_or_init_with(config, LoggerManager::new)
    }

    /// Like [`get_or_init`](Self::get_or_init) with a custom constructor,
    /// e.g. [`LoggerManager::with_store`].
    pub fn get_or_init_with<F>(
        &self,
        config: LogConfig,
        build: F,
    ) -> Result<Arc<LoggerManager>, PipelineError>
    where
        F: FnOnce(LogConfig) -> Result<LoggerManager, PipelineError>,
    {
        let key = (config.name.clone(), config.environment.clone());
        let mut managers = self.managers.lock();
        if let Some(existing) = managers.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let manager = Arc::new(build(config)?);
        managers.insert(key, Arc::clone(&manager));
        Ok(manager)
    }

    pub fn get(&self, name: &str, environment: &str) -> Option<Arc<LoggerManager>> {
        self.managers
            .lock()
            .get(&(name.to_string(), environment.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.managers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every registered manager and hand them back so the caller
    /// can shut them down.
    pub fn reset(&self) -> Vec<Arc<LoggerManager>> {
        self.managers.lock().drain().map(|(_, m)| m).collect()
    }
}

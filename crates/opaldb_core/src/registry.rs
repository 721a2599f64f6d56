//! Named database singletons over one engine.

use crate::config::DatabaseConfig;
use crate::database::DatabaseAccessor;
use opaldb_engine::Engine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Hands out one [`DatabaseAccessor`] per database name.
///
/// Registering the same name twice returns the accessor created first; the
/// later configuration's version is ignored. All accessors share the
/// registry's engine.
pub struct Registry {
    engine: Arc<dyn Engine>,
    databases: Mutex<HashMap<String, DatabaseAccessor>>,
}

impl Registry {
    /// Creates a registry over the given engine.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            databases: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the underlying engine is usable in this environment.
    #[must_use]
    pub fn supported(&self) -> bool {
        self.engine.supported()
    }

    /// Returns the accessor for the named database, creating it on first
    /// registration.
    pub fn config_database(&self, config: DatabaseConfig) -> DatabaseAccessor {
        let mut databases = self.databases.lock();
        databases
            .entry(config.name.clone())
            .or_insert_with(|| {
                DatabaseAccessor::new(Arc::clone(&self.engine), config.name, config.version)
            })
            .clone()
    }

    /// Looks up a previously registered database.
    #[must_use]
    pub fn database(&self, name: &str) -> Option<DatabaseAccessor> {
        self.databases.lock().get(name).cloned()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("databases", &self.databases.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opaldb_engine::MemoryEngine;

    fn registry() -> Registry {
        Registry::new(Arc::new(MemoryEngine::new()))
    }

    #[test]
    fn registering_twice_returns_the_first_accessor() {
        let registry = registry();
        let first = registry.config_database(DatabaseConfig::new("app", 1));
        let second = registry.config_database(DatabaseConfig::new("app", 7));
        assert_eq!(second.version(), 1);
        assert_eq!(first.name(), second.name());
    }

    #[test]
    fn lookup_finds_registered_databases_only() {
        let registry = registry();
        registry.config_database(DatabaseConfig::new("app", 1));
        assert!(registry.database("app").is_some());
        assert!(registry.database("other").is_none());
    }

    #[test]
    fn memory_engine_is_supported() {
        assert!(registry().supported());
    }
}

//! Database, store, and index configuration.

use crate::error::{CoreError, CoreResult};
use opaldb_engine::{IndexSpec, Value};
use std::fmt;
use std::sync::Arc;

/// Transforms one record from an old schema version to a new one.
///
/// Invoked as `mapper(record, old_version, new_version)` during a queued
/// migration job.
pub type UpgradeMapper = dyn Fn(Value, u64, u64) -> Value + Send + Sync;

/// Configuration for one named database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database name.
    pub name: String,
    /// Target schema version.
    pub version: u64,
}

impl DatabaseConfig {
    /// Creates a database configuration.
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// Configuration for one secondary index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Field the index key is derived from. Required and non-empty.
    pub key_path: String,
    /// Index name; defaults to the key path.
    pub name: Option<String>,
    /// Whether index keys must be unique.
    pub unique: bool,
    /// Whether array index keys yield one entry per element.
    pub multi_entry: bool,
}

impl IndexConfig {
    /// Creates an index configuration over `key_path`.
    pub fn new(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            name: None,
            unique: false,
            multi_entry: false,
        }
    }

    /// Sets an explicit index name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the uniqueness flag.
    #[must_use]
    pub fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Sets the multi-entry flag.
    #[must_use]
    pub fn multi_entry(mut self, value: bool) -> Self {
        self.multi_entry = value;
        self
    }

    /// Validates the configuration and fills in defaults.
    pub(crate) fn normalize(&self) -> CoreResult<IndexSpec> {
        if self.key_path.is_empty() {
            return Err(CoreError::configuration(
                "an index configuration must at least contain a key path",
            ));
        }
        let name = match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.key_path.clone(),
        };
        Ok(IndexSpec {
            name,
            key_path: self.key_path.clone(),
            unique: self.unique,
            multi_entry: self.multi_entry,
        })
    }
}

/// Declarative schema for one store.
#[derive(Clone)]
pub struct StoreConfig {
    /// Store name.
    pub name: String,
    /// Field holding the primary key.
    pub key_path: String,
    /// Whether keys are generated for records that carry none.
    pub auto_increment: bool,
    /// Secondary indexes to create during upgrades.
    pub indexes: Vec<IndexConfig>,
    /// Record transformation applied when the store survives a version
    /// upgrade.
    pub upgrade_mapper: Option<Arc<UpgradeMapper>>,
}

impl StoreConfig {
    /// Creates a store configuration with auto-increment enabled.
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            auto_increment: true,
            indexes: Vec::new(),
            upgrade_mapper: None,
        }
    }

    /// Sets the auto-increment flag.
    #[must_use]
    pub fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Declares a secondary index.
    #[must_use]
    pub fn index(mut self, index: IndexConfig) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the upgrade mapper.
    #[must_use]
    pub fn upgrade_mapper(
        mut self,
        mapper: impl Fn(Value, u64, u64) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.upgrade_mapper = Some(Arc::new(mapper));
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("name", &self.name)
            .field("key_path", &self.key_path)
            .field("auto_increment", &self.auto_increment)
            .field("indexes", &self.indexes)
            .field("upgrade_mapper", &self.upgrade_mapper.is_some())
            .finish()
    }
}

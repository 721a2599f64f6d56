//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the storage engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The requested version is lower than the stored version.
    #[error("version downgrade for database {name}: stored {stored}, requested {requested}")]
    VersionDowngrade {
        /// Database name.
        name: String,
        /// Version currently stored by the engine.
        stored: u64,
        /// Version the open request asked for.
        requested: u64,
    },

    /// The schema upgrade hook failed.
    #[error("upgrade failed: {message}")]
    UpgradeFailed {
        /// Description of the failure.
        message: String,
    },

    /// The named store does not exist.
    #[error("store not found: {name}")]
    StoreNotFound {
        /// Name of the store.
        name: String,
    },

    /// The named index does not exist on the store.
    #[error("index not found: {index} on store {store}")]
    IndexNotFound {
        /// Store the index was looked up on.
        store: String,
        /// Name of the index.
        index: String,
    },

    /// An `add` targeted a primary key that is already present.
    #[error("key already exists: {key}")]
    KeyExists {
        /// Display form of the conflicting key.
        key: String,
    },

    /// No usable primary key could be derived for a record.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// A write was issued through a read-only transaction.
    #[error("write through read-only transaction on store {store}")]
    ReadOnly {
        /// Store the write targeted.
        store: String,
    },

    /// A write violated a unique index constraint.
    #[error("unique constraint violated on index {index}")]
    UniqueConstraint {
        /// Name of the violated index.
        index: String,
    },

    /// The engine dropped a completion without settling it.
    #[error("completion dropped before settling")]
    Disconnected,
}

impl EngineError {
    /// Creates an upgrade failure error.
    pub fn upgrade_failed(message: impl Into<String>) -> Self {
        Self::UpgradeFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

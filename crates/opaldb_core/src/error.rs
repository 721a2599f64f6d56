//! Error types for the accessor layer.

use opaldb_engine::EngineError;
use thiserror::Error;

/// Result type for accessor operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the accessor layer.
///
/// Configuration problems are programmer errors and surface synchronously,
/// before any engine request is issued. Everything else arrives through the
/// asynchronous result channel with the engine's error attached unmodified.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid or duplicate configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The engine refused to open or upgrade the database.
    #[error("connection failed: {0}")]
    Connection(#[source] EngineError),

    /// A single CRUD or cursor request failed.
    #[error("request failed: {0}")]
    Request(#[source] EngineError),

    /// A migration job step failed.
    #[error("migration failed for store {store}: {source}")]
    Migration {
        /// Store the job was transforming.
        store: String,
        /// The failing step's error.
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a migration error wrapping the failing step.
    pub fn migration(store: impl Into<String>, source: CoreError) -> Self {
        Self::Migration {
            store: store.into(),
            source: Box::new(source),
        }
    }
}

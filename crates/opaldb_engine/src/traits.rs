//! Engine trait seams.
//!
//! The accessor layer consumes engines exclusively through these traits.
//! Engines are **completion-based**: every asynchronous outcome is delivered
//! through a [`Completion`], never by calling back into the accessor layer.

use crate::completion::Completion;
use crate::error::EngineResult;
use crate::types::{CursorEntry, Key, Mode, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to an open database connection.
pub type ConnectionRef = Arc<dyn Connection>;

/// Schema upgrade hook, invoked synchronously inside the upgrade transaction.
pub type UpgradeHook = Box<dyn FnOnce(&mut UpgradeEvent<'_>) -> EngineResult<()> + Send>;

/// Normalized definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Field the index key is derived from.
    pub key_path: String,
    /// Whether index keys must be unique across the store.
    pub unique: bool,
    /// Whether an array index key yields one entry per element.
    pub multi_entry: bool,
}

/// Context passed to the upgrade hook.
pub struct UpgradeEvent<'a> {
    /// Version stored before this upgrade (0 for a new database).
    pub old_version: u64,
    /// Version being upgraded to.
    pub new_version: u64,
    /// Schema-creation surface of the upgrade transaction.
    pub txn: &'a mut dyn UpgradeTxn,
}

/// Schema operations available inside the upgrade transaction.
///
/// # Invariants
///
/// - All calls happen synchronously inside the upgrade hook; the transaction
///   is not reentrant and must not cross an asynchronous gap
/// - `create_index` on an existing index name replaces its definition
pub trait UpgradeTxn {
    /// Returns whether a store with this name already exists.
    fn has_store(&self, name: &str) -> bool;

    /// Creates a new store.
    ///
    /// # Errors
    ///
    /// Returns an error if a store with this name already exists.
    fn create_store(&mut self, name: &str, key_path: &str, auto_increment: bool)
        -> EngineResult<()>;

    /// Creates (or redefines) an index on a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist.
    fn create_index(&mut self, store: &str, spec: &IndexSpec) -> EngineResult<()>;
}

/// A storage engine hosting named, versioned databases.
pub trait Engine: Send + Sync {
    /// Opens the named database at `version`.
    ///
    /// If the stored version is lower than `version`, the engine runs
    /// `on_upgrade` synchronously inside its upgrade transaction before the
    /// completion settles. Opening at a version lower than stored fails with
    /// [`crate::EngineError::VersionDowngrade`].
    fn open(&self, name: &str, version: u64, on_upgrade: UpgradeHook)
        -> Completion<ConnectionRef>;

    /// Capability probe: whether this engine is usable in the host
    /// environment.
    fn supported(&self) -> bool {
        true
    }
}

/// An open database connection.
pub trait Connection: Send + Sync {
    /// Database name.
    fn name(&self) -> &str;

    /// Version the connection is open at.
    fn version(&self) -> u64;

    /// Leases a fresh store transaction in the given mode.
    ///
    /// The handle must be used immediately within the same synchronous
    /// continuation; it is never cached or shared.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist.
    fn store(&self, name: &str, mode: Mode) -> EngineResult<Box<dyn StoreTxn>>;
}

/// A transaction-scoped handle to one store.
pub trait StoreTxn: Send {
    /// Inserts a record, failing if its primary key already exists.
    ///
    /// Auto-increment stores assign and inject a key when the record has
    /// none at the key path. The completion settles with the record's key.
    fn add(&mut self, value: Value) -> Completion<Key>;

    /// Inserts or replaces a record.
    fn put(&mut self, value: Value) -> Completion<Key>;

    /// Deletes the record with the given key, if present.
    fn delete(&mut self, key: Key) -> Completion<()>;

    /// Fetches the record with the given key.
    fn get(&mut self, key: Key) -> Completion<Option<Value>>;

    /// Removes every record in the store.
    fn clear(&mut self) -> Completion<()>;

    /// Counts the records in the store.
    fn count(&mut self) -> Completion<u64>;

    /// Opens a forward cursor over the store in primary key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be opened; in that case no
    /// record is ever visited.
    fn open_cursor(&mut self) -> EngineResult<Box<dyn Cursor>>;

    /// Opens a forward cursor over the named index in index key order.
    ///
    /// Entries carry the index key, the primary key, and the record value.
    ///
    /// # Errors
    ///
    /// Returns an error if the index does not exist.
    fn open_index_cursor(&mut self, index: &str) -> EngineResult<Box<dyn Cursor>>;
}

/// A forward-only traversal handle.
///
/// # Invariants
///
/// - Each `step` yields at most one entry; `None` signals exhaustion
/// - The next `step` may only be issued after the previous completion
///   settled
pub trait Cursor: Send {
    /// Advances to the next record.
    fn step(&mut self) -> Completion<Option<CursorEntry>>;
}

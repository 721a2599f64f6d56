//! Per-call store access with minimal-mode transaction leasing.

use crate::cursor::Stop;
use crate::database::DatabaseAccessor;
use crate::error::{CoreError, CoreResult};
use crate::index::IndexHelper;
use crate::store::StoreHelper;
use opaldb_engine::{Key, Mode, Value};

/// Accessor for one named store.
///
/// Every call first ensures the owning database connection is open, then
/// leases a fresh transaction in the minimal required mode - read-only for
/// reads and iteration, read-write for mutations - and delegates to a
/// [`StoreHelper`] that is dropped when the call resolves. No transaction is
/// ever reused across calls; this trades cross-call atomicity for freedom
/// from transaction-lifetime bugs.
#[derive(Clone)]
pub struct StoreAccessor {
    database: DatabaseAccessor,
    name: String,
}

impl StoreAccessor {
    pub(crate) fn new(database: DatabaseAccessor, name: String) -> Self {
        Self { database, name }
    }

    /// The store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Leases a fresh store transaction, opening the database if needed.
    pub(crate) async fn lease(&self, mode: Mode) -> CoreResult<StoreHelper> {
        let connection = self.database.open().await?;
        let txn = connection
            .store(&self.name, mode)
            .map_err(CoreError::Request)?;
        Ok(StoreHelper::new(txn))
    }

    /// Counts the records in the store.
    pub async fn count(&self) -> CoreResult<u64> {
        self.lease(Mode::ReadOnly).await?.count().await
    }

    /// Inserts one record, resolving with its primary key.
    pub async fn add(&self, value: Value) -> CoreResult<Key> {
        self.lease(Mode::ReadWrite).await?.add(value).await
    }

    /// Inserts a batch of records, resolving with their keys in input order.
    pub async fn add_all(&self, values: Vec<Value>) -> CoreResult<Vec<Key>> {
        self.lease(Mode::ReadWrite).await?.add_all(values).await
    }

    /// Inserts or replaces one record.
    pub async fn put(&self, value: Value) -> CoreResult<Key> {
        self.lease(Mode::ReadWrite).await?.put(value).await
    }

    /// Inserts or replaces a batch of records.
    pub async fn put_all(&self, values: Vec<Value>) -> CoreResult<Vec<Key>> {
        self.lease(Mode::ReadWrite).await?.put_all(values).await
    }

    /// Deletes the record with the given primary key.
    pub async fn delete(&self, key: impl Into<Key>) -> CoreResult<()> {
        self.lease(Mode::ReadWrite).await?.delete(key.into()).await
    }

    /// Deletes a batch of records by primary key.
    pub async fn delete_all(&self, keys: Vec<Key>) -> CoreResult<()> {
        self.lease(Mode::ReadWrite).await?.delete_all(keys).await
    }

    /// Fetches the record with the given primary key.
    pub async fn get(&self, key: impl Into<Key>) -> CoreResult<Option<Value>> {
        self.lease(Mode::ReadOnly).await?.get(key.into()).await
    }

    /// Fetches a batch of records, position-aligned with the input keys.
    pub async fn get_all(&self, keys: Vec<Key>) -> CoreResult<Vec<Option<Value>>> {
        self.lease(Mode::ReadOnly).await?.get_all(keys).await
    }

    /// Removes every record in the store.
    pub async fn clear(&self) -> CoreResult<()> {
        self.lease(Mode::ReadWrite).await?.clear().await
    }

    /// Visits every record in primary key order.
    pub async fn for_each<F>(&self, visit: F) -> CoreResult<()>
    where
        F: FnMut(Value, &mut Stop),
    {
        self.lease(Mode::ReadOnly).await?.for_each(visit).await
    }

    /// Collects the visitor's return value for every visited record.
    pub async fn map<T, F>(&self, transform: F) -> CoreResult<Vec<T>>
    where
        F: FnMut(Value, &mut Stop) -> T,
    {
        self.lease(Mode::ReadOnly).await?.map(transform).await
    }

    /// Collects the records the predicate accepts, preserving store order.
    pub async fn filter<F>(&self, keep: F) -> CoreResult<Vec<Value>>
    where
        F: FnMut(&Value, &mut Stop) -> bool,
    {
        self.lease(Mode::ReadOnly).await?.filter(keep).await
    }

    /// Collects every record in store order.
    pub async fn all(&self) -> CoreResult<Vec<Value>> {
        self.lease(Mode::ReadOnly).await?.all().await
    }

    /// Returns a fresh helper for the named secondary index.
    #[must_use]
    pub fn index(&self, name: impl Into<String>) -> IndexHelper {
        IndexHelper::new(self.clone(), name.into())
    }
}

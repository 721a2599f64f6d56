//! Index-ordered iteration yielding (primary key, value) pairs.

use crate::accessor::StoreAccessor;
use crate::cursor::{self, Stop};
use crate::error::CoreResult;
use opaldb_engine::{Key, Mode, Value};

/// One record as visited through a secondary index.
#[derive(Debug, Clone)]
pub struct IndexRow {
    /// The index key the row was reached through.
    pub index_key: Key,
    /// Primary key of the record.
    pub primary_key: Key,
    /// The record value.
    pub value: Value,
}

/// Parallel sequences of primary keys and values in index key order.
///
/// # Invariants
///
/// - `primary_keys.len() == values.len()`
/// - Position `i` in both sequences refers to the same record
#[derive(Debug, Clone, Default)]
pub struct IndexResult {
    /// Primary keys, in index key order.
    pub primary_keys: Vec<Key>,
    /// Record values, position-aligned with `primary_keys`.
    pub values: Vec<Value>,
}

impl IndexResult {
    /// Number of records in the result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primary_keys.len()
    }

    /// Whether the result holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary_keys.is_empty()
    }

    /// Iterates over `(primary_key, value)` pairs in index key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.primary_keys.iter().zip(self.values.iter())
    }
}

/// Index-ordered access to one store's secondary index.
///
/// The index handle is obtained lazily per call through a fresh read-only
/// lease; nothing is cached between calls.
pub struct IndexHelper {
    accessor: StoreAccessor,
    name: String,
}

impl IndexHelper {
    pub(crate) fn new(accessor: StoreAccessor, name: String) -> Self {
        Self { accessor, name }
    }

    /// The index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Visits every index entry in index key order.
    pub async fn for_each<F>(&self, mut visit: F) -> CoreResult<()>
    where
        F: FnMut(IndexRow, &mut Stop),
    {
        let mut helper = self.accessor.lease(Mode::ReadOnly).await?;
        let cursor = helper.open_index_cursor(&self.name)?;
        cursor::drive(cursor, |entry, stop| {
            // Index cursors always carry an index key.
            if let Some(index_key) = entry.index_key {
                visit(
                    IndexRow {
                        index_key,
                        primary_key: entry.primary_key,
                        value: entry.value,
                    },
                    stop,
                );
            }
        })
        .await
    }

    /// Collects the visitor's return value per visited row, in index order.
    pub async fn map<T, F>(&self, mut transform: F) -> CoreResult<Vec<T>>
    where
        F: FnMut(&IndexRow, &mut Stop) -> T,
    {
        let mut collected = Vec::new();
        self.for_each(|row, stop| collected.push(transform(&row, stop)))
            .await?;
        Ok(collected)
    }

    /// Collects the rows the predicate accepts into an [`IndexResult`].
    pub async fn filter<F>(&self, mut keep: F) -> CoreResult<IndexResult>
    where
        F: FnMut(&IndexRow, &mut Stop) -> bool,
    {
        let mut result = IndexResult::default();
        self.for_each(|row, stop| {
            if keep(&row, stop) {
                result.primary_keys.push(row.primary_key);
                result.values.push(row.value);
            }
        })
        .await?;
        Ok(result)
    }

    /// Collects every row into an [`IndexResult`].
    pub async fn all(&self) -> CoreResult<IndexResult> {
        self.filter(|_, _| true).await
    }
}

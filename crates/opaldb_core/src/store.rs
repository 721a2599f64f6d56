//! CRUD and iteration over one leased store handle.

use crate::bridge;
use crate::cursor::{self, Stop};
use crate::error::{CoreError, CoreResult};
use opaldb_engine::{Cursor, Key, StoreTxn, Value};

/// Wraps one leased store transaction.
///
/// A helper is created fresh for every logical operation group and consumed
/// within the same synchronous continuation that leased it; the underlying
/// transaction is never reused across calls.
pub struct StoreHelper {
    txn: Box<dyn StoreTxn>,
}

impl StoreHelper {
    pub(crate) fn new(txn: Box<dyn StoreTxn>) -> Self {
        Self { txn }
    }

    /// Inserts one record, resolving with its primary key.
    pub async fn add(&mut self, value: Value) -> CoreResult<Key> {
        bridge::settle(self.txn.add(value))
            .await
            .map_err(CoreError::Request)
    }

    /// Inserts a batch of records, resolving with their keys in input order.
    ///
    /// One engine request is issued per element; all must succeed. The first
    /// failure rejects the batch and no partial results are exposed.
    pub async fn add_all(&mut self, values: Vec<Value>) -> CoreResult<Vec<Key>> {
        let requests = values.into_iter().map(|v| self.txn.add(v)).collect();
        bridge::settle_all(requests).await.map_err(CoreError::Request)
    }

    /// Inserts or replaces one record.
    pub async fn put(&mut self, value: Value) -> CoreResult<Key> {
        bridge::settle(self.txn.put(value))
            .await
            .map_err(CoreError::Request)
    }

    /// Inserts or replaces a batch of records.
    pub async fn put_all(&mut self, values: Vec<Value>) -> CoreResult<Vec<Key>> {
        let requests = values.into_iter().map(|v| self.txn.put(v)).collect();
        bridge::settle_all(requests).await.map_err(CoreError::Request)
    }

    /// Deletes the record with the given primary key.
    pub async fn delete(&mut self, key: Key) -> CoreResult<()> {
        bridge::settle(self.txn.delete(key))
            .await
            .map_err(CoreError::Request)
    }

    /// Deletes a batch of records by primary key.
    pub async fn delete_all(&mut self, keys: Vec<Key>) -> CoreResult<()> {
        let requests = keys.into_iter().map(|k| self.txn.delete(k)).collect();
        bridge::settle_all(requests)
            .await
            .map_err(CoreError::Request)?;
        Ok(())
    }

    /// Fetches the record with the given primary key.
    pub async fn get(&mut self, key: Key) -> CoreResult<Option<Value>> {
        bridge::settle(self.txn.get(key))
            .await
            .map_err(CoreError::Request)
    }

    /// Fetches a batch of records, position-aligned with the input keys.
    pub async fn get_all(&mut self, keys: Vec<Key>) -> CoreResult<Vec<Option<Value>>> {
        let requests = keys.into_iter().map(|k| self.txn.get(k)).collect();
        bridge::settle_all(requests).await.map_err(CoreError::Request)
    }

    /// Removes every record in the store.
    pub async fn clear(&mut self) -> CoreResult<()> {
        bridge::settle(self.txn.clear())
            .await
            .map_err(CoreError::Request)
    }

    /// Counts the records in the store.
    pub async fn count(&mut self) -> CoreResult<u64> {
        bridge::settle(self.txn.count())
            .await
            .map_err(CoreError::Request)
    }

    /// Visits every record in primary key order.
    pub async fn for_each<F>(&mut self, mut visit: F) -> CoreResult<()>
    where
        F: FnMut(Value, &mut Stop),
    {
        let cursor = self.txn.open_cursor().map_err(CoreError::Request)?;
        cursor::drive(cursor, |entry, stop| visit(entry.value, stop)).await
    }

    /// Collects the visitor's return value for every visited record.
    pub async fn map<T, F>(&mut self, mut transform: F) -> CoreResult<Vec<T>>
    where
        F: FnMut(Value, &mut Stop) -> T,
    {
        let mut collected = Vec::new();
        self.for_each(|value, stop| collected.push(transform(value, stop)))
            .await?;
        Ok(collected)
    }

    /// Collects the records the predicate accepts, preserving store order.
    pub async fn filter<F>(&mut self, mut keep: F) -> CoreResult<Vec<Value>>
    where
        F: FnMut(&Value, &mut Stop) -> bool,
    {
        let mut collected = Vec::new();
        self.for_each(|value, stop| {
            if keep(&value, stop) {
                collected.push(value);
            }
        })
        .await?;
        Ok(collected)
    }

    /// Collects every record in store order.
    pub async fn all(&mut self) -> CoreResult<Vec<Value>> {
        self.map(|value, _| value).await
    }

    pub(crate) fn open_index_cursor(&mut self, index: &str) -> CoreResult<Box<dyn Cursor>> {
        self.txn.open_index_cursor(index).map_err(CoreError::Request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use opaldb_engine::{Connection, Engine, MemoryEngine, Mode};
    use serde_json::json;

    fn users_helper(engine: &MemoryEngine) -> StoreHelper {
        let conn = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let sink = std::sync::Arc::clone(&conn);
        engine
            .open(
                "store_tests",
                1,
                Box::new(|event| event.txn.create_store("users", "id", true)),
            )
            .on_settle(move |result| *sink.lock() = Some(result));
        let conn = conn.lock().take().unwrap().unwrap();
        StoreHelper::new(conn.store("users", Mode::ReadWrite).unwrap())
    }

    #[test]
    fn add_then_all_preserves_insertion_order() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            let keys = helper
                .add_all(vec![json!({"name": "a"}), json!({"name": "b"})])
                .await
                .unwrap();
            assert_eq!(keys, vec![Key::Int(1), Key::Int(2)]);

            let all = helper.all().await.unwrap();
            assert_eq!(
                all,
                vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})]
            );
        });
    }

    #[test]
    fn empty_batch_resolves_with_no_keys() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            assert!(helper.add_all(Vec::new()).await.unwrap().is_empty());
        });
    }

    #[test]
    fn count_matches_all_length() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            for i in 0..5 {
                helper.add(json!({ "n": i })).await.unwrap();
            }
            let count = helper.count().await.unwrap();
            let all = helper.all().await.unwrap();
            assert_eq!(count as usize, all.len());
        });
    }

    #[test]
    fn map_identity_equals_all() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            helper
                .add_all(vec![json!({"name": "x"}), json!({"name": "y"})])
                .await
                .unwrap();
            let mapped = helper.map(|value, _| value).await.unwrap();
            let all = helper.all().await.unwrap();
            assert_eq!(mapped, all);
        });
    }

    #[test]
    fn filter_keeps_matching_records_in_order() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            helper
                .add_all(vec![
                    json!({"name": "ada"}),
                    json!({"name": "bob"}),
                    json!({"name": "ann"}),
                ])
                .await
                .unwrap();
            let matched = helper
                .filter(|value, _| value["name"].as_str().is_some_and(|n| n.starts_with('a')))
                .await
                .unwrap();
            assert_eq!(matched.len(), 2);
            assert_eq!(matched[0]["name"], "ada");
            assert_eq!(matched[1]["name"], "ann");
        });
    }

    #[test]
    fn for_each_stop_limits_visits() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            for _ in 0..6 {
                helper.add(json!({"name": "u"})).await.unwrap();
            }
            let mut visited = 0;
            helper
                .for_each(|_, stop| {
                    visited += 1;
                    if visited == 3 {
                        stop.stop();
                    }
                })
                .await
                .unwrap();
            assert_eq!(visited, 3);
        });
    }

    #[test]
    fn delete_all_removes_only_the_given_keys() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            helper
                .add_all(vec![
                    json!({"name": "a"}),
                    json!({"name": "b"}),
                    json!({"name": "c"}),
                ])
                .await
                .unwrap();
            helper
                .delete_all(vec![Key::Int(1), Key::Int(2)])
                .await
                .unwrap();
            let all = helper.all().await.unwrap();
            assert_eq!(all, vec![json!({"id": 3, "name": "c"})]);
        });
    }

    #[test]
    fn get_all_aligns_results_with_input_keys() {
        let engine = MemoryEngine::new();
        let mut helper = users_helper(&engine);
        block_on(async {
            helper.add(json!({"name": "a"})).await.unwrap();
            let results = helper
                .get_all(vec![Key::Int(99), Key::Int(1)])
                .await
                .unwrap();
            assert_eq!(results.len(), 2);
            assert!(results[0].is_none());
            assert_eq!(results[1].as_ref().unwrap()["name"], "a");
        });
    }
}

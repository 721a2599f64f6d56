//! In-memory reference engine for testing.

use crate::completion::Completion;
use crate::error::{EngineError, EngineResult};
use crate::traits::{
    Connection, ConnectionRef, Cursor, Engine, IndexSpec, StoreTxn, UpgradeEvent, UpgradeHook,
    UpgradeTxn,
};
use crate::types::{CursorEntry, Key, Mode, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// A process-local storage engine.
///
/// `MemoryEngine` hosts named databases that live for the lifetime of the
/// engine instance, so closing and reopening a database through the same
/// engine exercises the full version-upgrade path. It is suitable for:
/// - Unit and integration tests
/// - Ephemeral databases that don't need persistence
///
/// Completions settle synchronously, but only through the same callback
/// surface a truly asynchronous engine would use.
///
/// # Example
///
/// ```rust
/// use opaldb_engine::{Engine, MemoryEngine};
///
/// let engine = MemoryEngine::new();
/// let open = engine.open("app", 1, Box::new(|event| {
///     event.txn.create_store("users", "id", true)
/// }));
/// open.on_settle(|conn| assert_eq!(conn.unwrap().version(), 1));
/// ```
#[derive(Default)]
pub struct MemoryEngine {
    databases: Mutex<HashMap<String, Arc<SharedDb>>>,
}

struct SharedDb {
    name: String,
    state: RwLock<DbState>,
}

#[derive(Clone, Default)]
struct DbState {
    version: u64,
    stores: BTreeMap<String, StoreState>,
}

#[derive(Clone)]
struct StoreState {
    key_path: String,
    auto_increment: bool,
    next_key: i64,
    indexes: BTreeMap<String, IndexSpec>,
    records: BTreeMap<Key, Value>,
}

impl MemoryEngine {
    /// Creates an engine with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(&self, name: &str) -> Arc<SharedDb> {
        let mut databases = self.databases.lock();
        Arc::clone(databases.entry(name.to_string()).or_insert_with(|| {
            Arc::new(SharedDb {
                name: name.to_string(),
                state: RwLock::new(DbState::default()),
            })
        }))
    }
}

impl Engine for MemoryEngine {
    fn open(
        &self,
        name: &str,
        version: u64,
        on_upgrade: UpgradeHook,
    ) -> Completion<ConnectionRef> {
        let db = self.shared(name);
        {
            let mut state = db.state.write();
            if version < state.version {
                return Completion::failed(EngineError::VersionDowngrade {
                    name: name.to_string(),
                    stored: state.version,
                    requested: version,
                });
            }
            if version > state.version {
                let old_version = state.version;
                let snapshot = state.clone();
                let result = {
                    let mut txn = MemoryUpgradeTxn { state: &mut state };
                    let mut event = UpgradeEvent {
                        old_version,
                        new_version: version,
                        txn: &mut txn,
                    };
                    on_upgrade(&mut event)
                };
                match result {
                    Ok(()) => state.version = version,
                    Err(error) => {
                        // Abort the upgrade transaction wholesale.
                        *state = snapshot;
                        return Completion::failed(error);
                    }
                }
            }
        }
        Completion::settled(Ok(Arc::new(MemoryConnection { db }) as ConnectionRef))
    }
}

struct MemoryUpgradeTxn<'a> {
    state: &'a mut DbState,
}

impl UpgradeTxn for MemoryUpgradeTxn<'_> {
    fn has_store(&self, name: &str) -> bool {
        self.state.stores.contains_key(name)
    }

    fn create_store(
        &mut self,
        name: &str,
        key_path: &str,
        auto_increment: bool,
    ) -> EngineResult<()> {
        if self.has_store(name) {
            return Err(EngineError::upgrade_failed(format!(
                "store {name} already exists"
            )));
        }
        self.state.stores.insert(
            name.to_string(),
            StoreState {
                key_path: key_path.to_string(),
                auto_increment,
                next_key: 1,
                indexes: BTreeMap::new(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn create_index(&mut self, store: &str, spec: &IndexSpec) -> EngineResult<()> {
        let store_state =
            self.state
                .stores
                .get_mut(store)
                .ok_or_else(|| EngineError::StoreNotFound {
                    name: store.to_string(),
                })?;
        store_state
            .indexes
            .insert(spec.name.clone(), spec.clone());
        Ok(())
    }
}

struct MemoryConnection {
    db: Arc<SharedDb>,
}

impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.db.name
    }

    fn version(&self) -> u64 {
        self.db.state.read().version
    }

    fn store(&self, name: &str, mode: Mode) -> EngineResult<Box<dyn StoreTxn>> {
        if !self.db.state.read().stores.contains_key(name) {
            return Err(EngineError::StoreNotFound {
                name: name.to_string(),
            });
        }
        Ok(Box::new(MemoryStoreTxn {
            db: Arc::clone(&self.db),
            store: name.to_string(),
            mode,
        }))
    }
}

struct MemoryStoreTxn {
    db: Arc<SharedDb>,
    store: String,
    mode: Mode,
}

impl MemoryStoreTxn {
    fn read_op<T: Send + 'static>(
        &self,
        op: impl FnOnce(&StoreState) -> EngineResult<T>,
    ) -> Completion<T> {
        let state = self.db.state.read();
        let result = match state.stores.get(&self.store) {
            Some(store) => op(store),
            None => Err(EngineError::StoreNotFound {
                name: self.store.clone(),
            }),
        };
        Completion::settled(result)
    }

    fn write_op<T: Send + 'static>(
        &self,
        op: impl FnOnce(&mut StoreState) -> EngineResult<T>,
    ) -> Completion<T> {
        if self.mode != Mode::ReadWrite {
            return Completion::failed(EngineError::ReadOnly {
                store: self.store.clone(),
            });
        }
        let mut state = self.db.state.write();
        let result = match state.stores.get_mut(&self.store) {
            Some(store) => op(store),
            None => Err(EngineError::StoreNotFound {
                name: self.store.clone(),
            }),
        };
        Completion::settled(result)
    }
}

impl StoreTxn for MemoryStoreTxn {
    fn add(&mut self, mut value: Value) -> Completion<Key> {
        self.write_op(move |store| {
            let key = derive_key(store, &mut value)?;
            if store.records.contains_key(&key) {
                return Err(EngineError::KeyExists {
                    key: key.to_string(),
                });
            }
            check_unique(store, &key, &value)?;
            bump_counter(store, &key);
            store.records.insert(key.clone(), value);
            Ok(key)
        })
    }

    fn put(&mut self, mut value: Value) -> Completion<Key> {
        self.write_op(move |store| {
            let key = derive_key(store, &mut value)?;
            check_unique(store, &key, &value)?;
            bump_counter(store, &key);
            store.records.insert(key.clone(), value);
            Ok(key)
        })
    }

    fn delete(&mut self, key: Key) -> Completion<()> {
        self.write_op(move |store| {
            store.records.remove(&key);
            Ok(())
        })
    }

    fn get(&mut self, key: Key) -> Completion<Option<Value>> {
        self.read_op(move |store| Ok(store.records.get(&key).cloned()))
    }

    fn clear(&mut self) -> Completion<()> {
        self.write_op(|store| {
            store.records.clear();
            Ok(())
        })
    }

    fn count(&mut self) -> Completion<u64> {
        self.read_op(|store| Ok(store.records.len() as u64))
    }

    fn open_cursor(&mut self) -> EngineResult<Box<dyn Cursor>> {
        let state = self.db.state.read();
        let store = state
            .stores
            .get(&self.store)
            .ok_or_else(|| EngineError::StoreNotFound {
                name: self.store.clone(),
            })?;
        // Cursors traverse a snapshot taken at open time.
        let entries = store
            .records
            .iter()
            .map(|(key, value)| CursorEntry {
                primary_key: key.clone(),
                index_key: None,
                value: value.clone(),
            })
            .collect();
        Ok(Box::new(MemoryCursor { entries }))
    }

    fn open_index_cursor(&mut self, index: &str) -> EngineResult<Box<dyn Cursor>> {
        let state = self.db.state.read();
        let store = state
            .stores
            .get(&self.store)
            .ok_or_else(|| EngineError::StoreNotFound {
                name: self.store.clone(),
            })?;
        let spec = store
            .indexes
            .get(index)
            .ok_or_else(|| EngineError::IndexNotFound {
                store: self.store.clone(),
                index: index.to_string(),
            })?;

        let mut rows: Vec<(Key, Key, Value)> = Vec::new();
        for (primary_key, value) in &store.records {
            for index_key in index_keys(spec, value) {
                rows.push((index_key, primary_key.clone(), value.clone()));
            }
        }
        // Index key order, primary key order within equal index keys.
        rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let entries = rows
            .into_iter()
            .map(|(index_key, primary_key, value)| CursorEntry {
                primary_key,
                index_key: Some(index_key),
                value,
            })
            .collect();
        Ok(Box::new(MemoryCursor { entries }))
    }
}

struct MemoryCursor {
    entries: VecDeque<CursorEntry>,
}

impl Cursor for MemoryCursor {
    fn step(&mut self) -> Completion<Option<CursorEntry>> {
        Completion::settled(Ok(self.entries.pop_front()))
    }
}

/// Resolves the primary key for a record, injecting a generated key into
/// auto-increment records that carry none.
fn derive_key(store: &mut StoreState, value: &mut Value) -> EngineResult<Key> {
    if let Some(field) = value.get(&store.key_path) {
        if !field.is_null() {
            return Key::from_json(field).ok_or_else(|| {
                EngineError::invalid_key(format!(
                    "field {} does not hold a valid key",
                    store.key_path
                ))
            });
        }
    }
    if !store.auto_increment {
        return Err(EngineError::invalid_key(format!(
            "record has no key at {} and the store does not auto-increment",
            store.key_path
        )));
    }
    match value {
        Value::Object(fields) => {
            let key = store.next_key;
            fields.insert(store.key_path.clone(), Value::from(key));
            Ok(Key::Int(key))
        }
        _ => Err(EngineError::invalid_key(
            "cannot inject a generated key into a non-object record",
        )),
    }
}

/// Keeps the auto-increment counter ahead of every integer key seen.
fn bump_counter(store: &mut StoreState, key: &Key) {
    if let Key::Int(n) = key {
        store.next_key = store.next_key.max(n.saturating_add(1));
    }
}

fn check_unique(store: &StoreState, primary: &Key, value: &Value) -> EngineResult<()> {
    for spec in store.indexes.values().filter(|spec| spec.unique) {
        for candidate in index_keys(spec, value) {
            let clash = store.records.iter().any(|(key, existing)| {
                key != primary && index_keys(spec, existing).contains(&candidate)
            });
            if clash {
                return Err(EngineError::UniqueConstraint {
                    index: spec.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Derives the index keys a record contributes to an index.
///
/// Records without a usable value at the index key path contribute nothing.
fn index_keys(spec: &IndexSpec, value: &Value) -> Vec<Key> {
    match value.get(&spec.key_path) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) if spec.multi_entry => {
            items.iter().filter_map(Key::from_json).collect()
        }
        Some(field) => Key::from_json(field).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wait<T: Send + 'static>(completion: Completion<T>) -> EngineResult<T> {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        completion.on_settle(move |result| *sink.lock() = Some(result));
        let result = slot.lock().take();
        result.expect("memory engine settles synchronously")
    }

    fn open_users_db(engine: &MemoryEngine) -> ConnectionRef {
        let completion = engine.open(
            "test",
            1,
            Box::new(|event| {
                event.txn.create_store("users", "id", true)?;
                event.txn.create_index(
                    "users",
                    &IndexSpec {
                        name: "by_name".into(),
                        key_path: "name".into(),
                        unique: false,
                        multi_entry: false,
                    },
                )
            }),
        );
        wait(completion).unwrap()
    }

    #[test]
    fn open_runs_upgrade_hook_once() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        assert_eq!(conn.version(), 1);

        // Second open at the same version must not upgrade again.
        let completion = engine.open(
            "test",
            1,
            Box::new(|_| panic!("hook must not run without a version change")),
        );
        assert!(wait(completion).is_ok());
    }

    #[test]
    fn upgrade_hook_sees_old_and_new_versions() {
        let engine = MemoryEngine::new();
        open_users_db(&engine);

        let completion = engine.open(
            "test",
            3,
            Box::new(|event| {
                assert_eq!(event.old_version, 1);
                assert_eq!(event.new_version, 3);
                Ok(())
            }),
        );
        assert_eq!(wait(completion).unwrap().version(), 3);
    }

    #[test]
    fn version_downgrade_is_rejected() {
        let engine = MemoryEngine::new();
        let completion = engine.open("test", 5, Box::new(|_| Ok(())));
        wait(completion).unwrap();

        let completion = engine.open("test", 2, Box::new(|_| Ok(())));
        assert!(matches!(
            wait(completion),
            Err(EngineError::VersionDowngrade {
                stored: 5,
                requested: 2,
                ..
            })
        ));
    }

    #[test]
    fn failed_upgrade_rolls_back_schema() {
        let engine = MemoryEngine::new();
        let completion = engine.open(
            "test",
            1,
            Box::new(|event| {
                event.txn.create_store("orphans", "id", true)?;
                Err(EngineError::upgrade_failed("boom"))
            }),
        );
        assert!(wait(completion).is_err());

        // The aborted upgrade must leave no trace.
        let conn = wait(engine.open("test", 0, Box::new(|_| Ok(())))).unwrap();
        assert_eq!(conn.version(), 0);
        assert!(conn.store("orphans", Mode::ReadOnly).is_err());
    }

    #[test]
    fn add_assigns_and_injects_auto_increment_keys() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadWrite).unwrap();

        assert_eq!(wait(txn.add(json!({"name": "a"}))).unwrap(), Key::Int(1));
        assert_eq!(wait(txn.add(json!({"name": "b"}))).unwrap(), Key::Int(2));

        let record = wait(txn.get(Key::Int(1))).unwrap().unwrap();
        assert_eq!(record, json!({"id": 1, "name": "a"}));
    }

    #[test]
    fn explicit_keys_are_honored_and_advance_the_counter() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadWrite).unwrap();

        assert_eq!(
            wait(txn.add(json!({"id": 10, "name": "x"}))).unwrap(),
            Key::Int(10)
        );
        // Generated keys continue past the explicit one.
        assert_eq!(wait(txn.add(json!({"name": "y"}))).unwrap(), Key::Int(11));
    }

    #[test]
    fn add_rejects_existing_keys_but_put_replaces() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadWrite).unwrap();

        wait(txn.add(json!({"id": 1, "name": "a"}))).unwrap();
        assert!(matches!(
            wait(txn.add(json!({"id": 1, "name": "b"}))),
            Err(EngineError::KeyExists { .. })
        ));

        wait(txn.put(json!({"id": 1, "name": "b"}))).unwrap();
        let record = wait(txn.get(Key::Int(1))).unwrap().unwrap();
        assert_eq!(record["name"], "b");
    }

    #[test]
    fn writes_through_read_only_lease_fail() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadOnly).unwrap();

        assert!(matches!(
            wait(txn.add(json!({"name": "a"}))),
            Err(EngineError::ReadOnly { .. })
        ));
        // Reads still work.
        assert_eq!(wait(txn.count()).unwrap(), 0);
    }

    #[test]
    fn cursor_visits_records_in_key_order() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadWrite).unwrap();
        for id in [3, 1, 2] {
            wait(txn.add(json!({"id": id, "name": "u"}))).unwrap();
        }

        let mut cursor = txn.open_cursor().unwrap();
        let mut keys = Vec::new();
        while let Some(entry) = wait(cursor.step()).unwrap() {
            assert!(entry.index_key.is_none());
            keys.push(entry.primary_key);
        }
        assert_eq!(keys, vec![Key::Int(1), Key::Int(2), Key::Int(3)]);
    }

    #[test]
    fn index_cursor_orders_by_index_key() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadWrite).unwrap();
        wait(txn.add(json!({"id": 1, "name": "carol"}))).unwrap();
        wait(txn.add(json!({"id": 2, "name": "alice"}))).unwrap();
        wait(txn.add(json!({"id": 3, "name": "bob"}))).unwrap();

        let mut cursor = txn.open_index_cursor("by_name").unwrap();
        let mut names = Vec::new();
        while let Some(entry) = wait(cursor.step()).unwrap() {
            assert!(entry.index_key.is_some());
            names.push(entry.value["name"].as_str().unwrap().to_string());
        }
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn index_skips_records_without_the_indexed_field() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadWrite).unwrap();
        wait(txn.add(json!({"id": 1, "name": "a"}))).unwrap();
        wait(txn.add(json!({"id": 2}))).unwrap();

        let mut cursor = txn.open_index_cursor("by_name").unwrap();
        let mut visited = 0;
        while wait(cursor.step()).unwrap().is_some() {
            visited += 1;
        }
        assert_eq!(visited, 1);
    }

    #[test]
    fn multi_entry_index_expands_array_keys() {
        let engine = MemoryEngine::new();
        let completion = engine.open(
            "tags",
            1,
            Box::new(|event| {
                event.txn.create_store("posts", "id", true)?;
                event.txn.create_index(
                    "posts",
                    &IndexSpec {
                        name: "by_tag".into(),
                        key_path: "tags".into(),
                        unique: false,
                        multi_entry: true,
                    },
                )
            }),
        );
        let conn = wait(completion).unwrap();
        let mut txn = conn.store("posts", Mode::ReadWrite).unwrap();
        wait(txn.add(json!({"id": 1, "tags": ["b", "a"]}))).unwrap();

        let mut cursor = txn.open_index_cursor("by_tag").unwrap();
        let mut tags = Vec::new();
        while let Some(entry) = wait(cursor.step()).unwrap() {
            tags.push(entry.index_key.unwrap());
        }
        assert_eq!(tags, vec![Key::from("a"), Key::from("b")]);
    }

    #[test]
    fn unique_index_rejects_duplicate_keys() {
        let engine = MemoryEngine::new();
        let completion = engine.open(
            "accounts",
            1,
            Box::new(|event| {
                event.txn.create_store("accounts", "id", true)?;
                event.txn.create_index(
                    "accounts",
                    &IndexSpec {
                        name: "by_email".into(),
                        key_path: "email".into(),
                        unique: true,
                        multi_entry: false,
                    },
                )
            }),
        );
        let conn = wait(completion).unwrap();
        let mut txn = conn.store("accounts", Mode::ReadWrite).unwrap();
        wait(txn.add(json!({"email": "a@example.com"}))).unwrap();

        assert!(matches!(
            wait(txn.add(json!({"email": "a@example.com"}))),
            Err(EngineError::UniqueConstraint { .. })
        ));
    }

    #[test]
    fn clear_and_count() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        let mut txn = conn.store("users", Mode::ReadWrite).unwrap();
        for _ in 0..4 {
            wait(txn.add(json!({"name": "u"}))).unwrap();
        }
        assert_eq!(wait(txn.count()).unwrap(), 4);

        wait(txn.clear()).unwrap();
        assert_eq!(wait(txn.count()).unwrap(), 0);
    }

    #[test]
    fn unknown_store_and_index_are_reported() {
        let engine = MemoryEngine::new();
        let conn = open_users_db(&engine);
        assert!(matches!(
            conn.store("missing", Mode::ReadOnly),
            Err(EngineError::StoreNotFound { .. })
        ));

        let mut txn = conn.store("users", Mode::ReadOnly).unwrap();
        assert!(matches!(
            txn.open_index_cursor("missing"),
            Err(EngineError::IndexNotFound { .. })
        ));
    }
}

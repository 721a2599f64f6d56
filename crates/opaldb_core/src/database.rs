//! Connection lifecycle, schema registration, and migration orchestration.

use crate::accessor::StoreAccessor;
use crate::bridge;
use crate::config::{StoreConfig, UpgradeMapper};
use crate::error::{CoreError, CoreResult};
use opaldb_engine::{ConnectionRef, Engine, IndexSpec, UpgradeEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// A store configuration registered with a database, with its index
/// configurations already normalized.
struct RegisteredStore {
    config: StoreConfig,
    index_specs: Vec<IndexSpec>,
}

/// Everything the upgrade hook needs about one store, detached from the
/// accessor so the hook can be handed to the engine.
struct StorePlan {
    name: String,
    key_path: String,
    auto_increment: bool,
    indexes: Vec<IndexSpec>,
    has_mapper: bool,
}

/// A queued record transformation for one store.
#[derive(Debug, Clone)]
struct MigrationJob {
    store: String,
    old_version: u64,
    new_version: u64,
}

struct State {
    stores: Vec<RegisteredStore>,
    connection: Option<ConnectionRef>,
}

struct Inner {
    name: String,
    version: u64,
    engine: Arc<dyn Engine>,
    /// Serializes the open path so the upgrade and migration run happen once.
    open_lock: futures::lock::Mutex<()>,
    state: Mutex<State>,
}

/// Accessor for one named, versioned database.
///
/// Configuration accumulates before the first `open()`; the connection is
/// created lazily on first use and cached for the lifetime of the accessor.
/// Cloning is cheap and every clone shares the same connection and
/// registrations.
///
/// # Lifecycle
///
/// `Unopened -> Opening -> Upgrading? -> MigratingJobs? -> Open`
///
/// Store and index creation happen strictly synchronously inside the
/// engine's upgrade transaction; record transformation is deferred to the
/// migration queue, which runs only once the connection is live. This split
/// is imposed by the engine: the upgrade transaction is non-reentrant and
/// must not cross an asynchronous gap.
#[derive(Clone)]
pub struct DatabaseAccessor {
    inner: Arc<Inner>,
}

impl DatabaseAccessor {
    pub(crate) fn new(engine: Arc<dyn Engine>, name: String, version: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                version,
                engine,
                open_lock: futures::lock::Mutex::new(()),
                state: Mutex::new(State {
                    stores: Vec::new(),
                    connection: None,
                }),
            }),
        }
    }

    /// The database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The target schema version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version
    }

    /// Registers a store configuration and returns its accessor.
    ///
    /// Only permitted before the first `open()`. Index configurations are
    /// normalized eagerly so invalid ones fail here rather than mid-upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the database is already open,
    /// the store name or key path is empty, or the name is already
    /// registered.
    pub fn config_store(&self, config: StoreConfig) -> CoreResult<StoreAccessor> {
        if config.name.is_empty() || config.key_path.is_empty() {
            return Err(CoreError::configuration(
                "a store configuration must at least contain a name and a key path",
            ));
        }
        let index_specs = config
            .indexes
            .iter()
            .map(|index| index.normalize())
            .collect::<CoreResult<Vec<_>>>()?;

        let mut state = self.inner.state.lock();
        if state.connection.is_some() {
            return Err(CoreError::configuration(format!(
                "cannot register store {} after the database has been opened",
                config.name
            )));
        }
        if state.stores.iter().any(|s| s.config.name == config.name) {
            return Err(CoreError::configuration(format!(
                "store {} is already registered",
                config.name
            )));
        }

        let name = config.name.clone();
        state.stores.push(RegisteredStore {
            config,
            index_specs,
        });
        Ok(StoreAccessor::new(self.clone(), name))
    }

    /// Returns the accessor for a registered store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if no store with this name was
    /// registered.
    pub fn store(&self, name: &str) -> CoreResult<StoreAccessor> {
        let state = self.inner.state.lock();
        if state.stores.iter().any(|s| s.config.name == name) {
            Ok(StoreAccessor::new(self.clone(), name.to_string()))
        } else {
            Err(CoreError::configuration(format!(
                "store {name} is not registered with database {}",
                self.inner.name
            )))
        }
    }

    /// Opens the database, upgrading and migrating if required.
    ///
    /// Idempotent: a live connection is returned immediately. On first open,
    /// missing stores and declared indexes are created inside the engine's
    /// upgrade transaction, and queued migration jobs run strictly
    /// sequentially before the returned future resolves. A migration failure
    /// aborts the remaining jobs but does not fail the open (the connection
    /// is live at that point; callers needing stricter semantics can inspect
    /// the stores themselves).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`] if the engine refuses to open or
    /// the upgrade transaction fails.
    pub async fn open(&self) -> CoreResult<ConnectionRef> {
        if let Some(connection) = self.inner.state.lock().connection.clone() {
            return Ok(connection);
        }

        let _guard = self.inner.open_lock.lock().await;
        // A concurrent caller may have finished opening while we waited.
        if let Some(connection) = self.inner.state.lock().connection.clone() {
            return Ok(connection);
        }

        let plans: Vec<StorePlan> = {
            let state = self.inner.state.lock();
            state
                .stores
                .iter()
                .map(|registered| StorePlan {
                    name: registered.config.name.clone(),
                    key_path: registered.config.key_path.clone(),
                    auto_increment: registered.config.auto_increment,
                    indexes: registered.index_specs.clone(),
                    has_mapper: registered.config.upgrade_mapper.is_some(),
                })
                .collect()
        };

        let queue: Arc<Mutex<Vec<MigrationJob>>> = Arc::new(Mutex::new(Vec::new()));
        let hook_queue = Arc::clone(&queue);
        let database = self.inner.name.clone();

        let completion = self.inner.engine.open(
            &self.inner.name,
            self.inner.version,
            Box::new(move |event: &mut UpgradeEvent<'_>| {
                tracing::info!(
                    %database,
                    old_version = event.old_version,
                    new_version = event.new_version,
                    "upgrading database schema"
                );
                for plan in &plans {
                    let existed = event.txn.has_store(&plan.name);
                    if !existed {
                        event
                            .txn
                            .create_store(&plan.name, &plan.key_path, plan.auto_increment)?;
                    }
                    for spec in &plan.indexes {
                        event.txn.create_index(&plan.name, spec)?;
                    }
                    // Only stores that survived from a previous version have
                    // records to transform.
                    if existed && plan.has_mapper && event.old_version != event.new_version {
                        hook_queue.lock().push(MigrationJob {
                            store: plan.name.clone(),
                            old_version: event.old_version,
                            new_version: event.new_version,
                        });
                    }
                }
                Ok(())
            }),
        );

        let connection = bridge::settle(completion)
            .await
            .map_err(CoreError::Connection)?;
        self.inner.state.lock().connection = Some(Arc::clone(&connection));

        let jobs = std::mem::take(&mut *queue.lock());
        // Boxed to break the async recursion cycle through `StoreAccessor::lease`,
        // which re-enters `open`.
        Box::pin(self.run_migrations(jobs)).await;

        Ok(connection)
    }

    /// Runs queued migration jobs strictly sequentially, in registration
    /// order. The first failing job aborts the rest of the run.
    async fn run_migrations(&self, jobs: Vec<MigrationJob>) {
        for job in jobs {
            if let Err(error) = self.run_migration(&job).await {
                tracing::error!(
                    database = %self.inner.name,
                    store = %job.store,
                    %error,
                    "migration job failed; aborting remaining jobs"
                );
                break;
            }
        }
    }

    async fn run_migration(&self, job: &MigrationJob) -> CoreResult<()> {
        tracing::info!(
            database = %self.inner.name,
            store = %job.store,
            old_version = job.old_version,
            new_version = job.new_version,
            "migrating store records"
        );

        let mapper: Arc<UpgradeMapper> = {
            let state = self.inner.state.lock();
            match state
                .stores
                .iter()
                .find(|s| s.config.name == job.store)
                .and_then(|s| s.config.upgrade_mapper.clone())
            {
                Some(mapper) => mapper,
                // Jobs are only queued for stores with a mapper.
                None => return Ok(()),
            }
        };

        let accessor = self
            .store(&job.store)
            .map_err(|e| CoreError::migration(&job.store, e))?;
        let (old_version, new_version) = (job.old_version, job.new_version);
        let mapped = accessor
            .map(move |value, _| mapper(value, old_version, new_version))
            .await
            .map_err(|e| CoreError::migration(&job.store, e))?;
        accessor
            .clear()
            .await
            .map_err(|e| CoreError::migration(&job.store, e))?;
        accessor
            .add_all(mapped)
            .await
            .map_err(|e| CoreError::migration(&job.store, e))?;
        Ok(())
    }
}

impl std::fmt::Debug for DatabaseAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DatabaseAccessor")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("stores", &state.stores.len())
            .field("open", &state.connection.is_some())
            .finish()
    }
}

//! # OpalDB Core
//!
//! Promise-style accessor layer over an OpalDB storage engine.
//!
//! The engine surface (`opaldb_engine`) is callback-based and
//! transaction-scoped; this crate turns it into a small set of async
//! accessors that hide transaction and cursor lifetimes entirely:
//!
//! - [`Registry`] - one accessor per database name over a shared engine
//! - [`DatabaseAccessor`] - schema registration, lazy open, versioned
//!   upgrades, and sequential record migrations
//! - [`StoreAccessor`] - per-call CRUD and iteration; every call leases a
//!   fresh transaction in the minimal required mode
//! - [`IndexHelper`] / [`IndexResult`] - index-ordered reads with
//!   position-aligned primary keys and values
//!
//! ## Example
//!
//! ```
//! use futures::executor::block_on;
//! use opaldb_core::{DatabaseConfig, Registry, StoreConfig};
//! use opaldb_engine::MemoryEngine;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = Registry::new(Arc::new(MemoryEngine::new()));
//! let db = registry.config_database(DatabaseConfig::new("app", 1));
//! let users = db.config_store(StoreConfig::new("users", "id"))?;
//!
//! block_on(async {
//!     users.add(json!({ "name": "ada" })).await?;
//!     let all = users.all().await?;
//!     assert_eq!(all.len(), 1);
//!     Ok::<_, opaldb_core::CoreError>(())
//! })?;
//! # Ok::<_, opaldb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accessor;
mod bridge;
mod config;
mod cursor;
mod database;
mod error;
mod index;
mod registry;
mod store;

pub use accessor::StoreAccessor;
pub use config::{DatabaseConfig, IndexConfig, StoreConfig, UpgradeMapper};
pub use cursor::Stop;
pub use database::DatabaseAccessor;
pub use error::{CoreError, CoreResult};
pub use index::{IndexHelper, IndexResult, IndexRow};
pub use registry::Registry;
pub use store::StoreHelper;

// Re-exported so callers can speak the engine's vocabulary without a direct
// dependency on it.
pub use opaldb_engine::{Key, Mode, Value};

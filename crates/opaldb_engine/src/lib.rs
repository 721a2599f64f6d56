//! # OpalDB Engine
//!
//! Storage engine abstraction for OpalDB.
//!
//! This crate defines the callback-based surface that the accessor layer
//! (`opaldb_core`) is built on top of:
//!
//! - [`Completion`] - a one-shot completion handle the engine settles with a
//!   result or an error
//! - [`Engine`], [`Connection`], [`StoreTxn`], [`Cursor`] - the trait seams
//!   for opening a versioned database, leasing store transactions, and
//!   traversing records
//! - [`UpgradeTxn`] - the schema-creation surface available only inside the
//!   engine's non-reentrant upgrade transaction
//!
//! ## Design Principles
//!
//! - Engines signal every asynchronous outcome through a [`Completion`];
//!   they never call back into the accessor layer directly
//! - Store transactions are leased per logical operation and never shared
//! - The upgrade hook runs synchronously inside the upgrade transaction;
//!   no awaited work is permitted there
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - process-local reference engine for testing and
//!   ephemeral deployments

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod completion;
mod error;
mod memory;
mod traits;
mod types;

pub use completion::{Completion, Signal};
pub use error::{EngineError, EngineResult};
pub use memory::MemoryEngine;
pub use traits::{
    Connection, ConnectionRef, Cursor, Engine, IndexSpec, StoreTxn, UpgradeEvent, UpgradeHook,
    UpgradeTxn,
};
pub use types::{CursorEntry, Key, Mode, Value};

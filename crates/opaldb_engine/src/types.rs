//! Core value types shared between the engine and the accessor layer.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A record value.
///
/// Records are JSON documents; key paths address their top-level fields.
pub type Value = serde_json::Value;

/// A primary or index key.
///
/// Keys are totally ordered: integers compare numerically and sort before
/// strings, strings compare lexicographically. This matches the key ordering
/// of the cursor-oriented engines this layer targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// An integer key, as produced by auto-increment stores.
    Int(i64),
    /// A string key.
    Str(String),
}

impl Key {
    /// Derives a key from a JSON value, if the value is a usable key type.
    ///
    /// Integer numbers and strings are keys; everything else is not.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Key::Int),
            Value::String(s) => Some(Key::Str(s.clone())),
            _ => None,
        }
    }

    /// Converts the key back into a JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Key::Int(n) => Value::from(*n),
            Key::Str(s) => Value::from(s.clone()),
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            (Key::Int(_), Key::Str(_)) => Ordering::Less,
            (Key::Str(_), Key::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

/// Access mode of a leased store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reads and cursor traversal only.
    ReadOnly,
    /// Reads plus `add`/`put`/`delete`/`clear`.
    ReadWrite,
}

/// One record as seen by a cursor.
#[derive(Debug, Clone)]
pub struct CursorEntry {
    /// Primary key of the record.
    pub primary_key: Key,
    /// Index key the cursor is positioned at; `None` for primary-store cursors.
    pub index_key: Option<Key>,
    /// The record value.
    pub value: Value,
}

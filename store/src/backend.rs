//! Key/value backend trait and the in-memory implementation.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreResult;

/// A string-keyed store of JSON values.
///
/// Implementations must make `get_many` and `set_all` atomic with respect
/// to each other: a reader sees either all or none of a `set_all` batch.
pub trait KeyValueStore: Send + Sync {
    /// Read several keys in one consistent snapshot.
    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<Value>>>;

    /// Write a batch of keys as one unit.
    fn set_all(&self, entries: Vec<(String, Value)>) -> StoreResult<()>;

    /// Read a single key.
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.get_many(&[key])?.pop().flatten())
    }
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<Value>>> {
        let entries = self.entries.read();
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_all(&self, batch: Vec<(String, Value)>) -> StoreResult<()> {
        let mut entries = self.entries.write();
        entries.extend(batch);
        Ok(())
    }
}

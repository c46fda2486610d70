//! Data storage whose lookup path is broken.

use crate::application::ports::{Storage, StorageError};
use crate::infrastructure::storage::ShardedStorage;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Error,
    Panic,
}

/// Storage that accepts writes but cannot serve lookups.
///
/// Models a corrupted primary lookup so tests can exercise the store's
/// snapshot fallback. Every mutator works normally; only `get` fails.
#[derive(Debug)]
pub struct CorruptedStorage {
    inner: ShardedStorage<String, Value>,
    mode: FailureMode,
}

impl CorruptedStorage {
    /// Storage whose lookups return `StorageError::Corrupted`.
    pub fn new() -> Self {
        Self {
            inner: ShardedStorage::new(),
            mode: FailureMode::Error,
        }
    }

    /// Storage whose lookups panic.
    pub fn panicking() -> Self {
        Self {
            inner: ShardedStorage::new(),
            mode: FailureMode::Panic,
        }
    }
}

impl Default for CorruptedStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage<String, Value> for CorruptedStorage {
    fn get(&self, key: &String) -> Result<Option<Value>, StorageError> {
        match self.mode {
            FailureMode::Error => Err(StorageError::Corrupted(format!(
                "lookup of {:?} hit a damaged shard",
                key
            ))),
            FailureMode::Panic => panic!("lookup of {:?} hit a damaged shard", key),
        }
    }

    fn insert(&self, key: String, value: Value) {
        self.inner.insert(key, value)
    }

    fn remove(&self, key: &String) -> Option<Value> {
        self.inner.remove(key)
    }

    fn remove_if<F>(&self, key: &String, predicate: F) -> bool
    where
        F: FnOnce(&Value) -> bool,
    {
        self.inner.remove_if(key, predicate)
    }

    fn with_entry_mut<F, R>(&self, key: String, factory: impl FnOnce() -> Value, accessor: F) -> R
    where
        F: FnOnce(&mut Value) -> R,
    {
        self.inner.with_entry_mut(key, factory, accessor)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn entries(&self) -> Vec<(String, Value)> {
        self.inner.entries()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn clear(&self) {
        self.inner.clear()
    }
}

//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::client_id::ClientId;
use serde_json::{Map, Value};
use std::fmt::{self, Debug};
use std::hash::Hash;

/// A flattened copy of the data namespace, as persisted in a snapshot.
pub type Document = Map<String, Value>;

/// Error reported by a storage adapter whose primary lookup path failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing structure is in a state that cannot be read
    Corrupted(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Corrupted(reason) => write!(f, "storage corrupted: {}", reason),
        }
    }
}

impl std::error::Error for StorageError {}

/// Error returned when a snapshot write fails.
///
/// Read-side failures never produce this error; they degrade to an empty
/// document inside the adapter.
#[derive(Debug)]
pub enum PersistenceError {
    /// Writing or renaming the snapshot file failed
    Io(std::io::Error),
    /// The document could not be encoded as JSON
    Encode(serde_json::Error),
    /// The write did not finish within the configured I/O timeout
    Timeout(std::time::Duration),
    /// The blocking write task panicked or was cancelled
    Join(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "snapshot write failed: {}", e),
            PersistenceError::Encode(e) => write!(f, "snapshot encoding failed: {}", e),
            PersistenceError::Timeout(d) => write!(f, "snapshot write timed out after {:?}", d),
            PersistenceError::Join(reason) => write!(f, "snapshot write task failed: {}", reason),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io(e) => Some(e),
            PersistenceError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Encode(e)
    }
}

/// Port for concurrent key-value storage.
///
/// Each namespace of the store is backed by one implementation of this port.
/// Every accessor must serialize with every mutator for the same key.
/// Infrastructure provides concrete implementations (ShardedStorage).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Look up a value, cloning it out of the map.
    ///
    /// # Errors
    /// Returns `StorageError` if the lookup cannot be completed. A missing
    /// key is `Ok(None)`, never an error.
    fn get(&self, key: &K) -> Result<Option<V>, StorageError>;

    /// Insert or overwrite a value.
    fn insert(&self, key: K, value: V);

    /// Remove a key, returning its value if it was present.
    fn remove(&self, key: &K) -> Option<V>;

    /// Remove a key only if the predicate holds for its current value.
    ///
    /// The check and the removal happen under the same lock.
    fn remove_if<F>(&self, key: &K, predicate: F) -> bool
    where
        F: FnOnce(&V) -> bool;

    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    /// * `factory` - Function to create a new value if the key doesn't exist
    /// * `accessor` - Function that gets mutable access to the value
    ///
    /// # Returns
    /// The result from the accessor function
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Point-in-time copy of all keys.
    fn keys(&self) -> Vec<K>;

    /// Point-in-time copy of all entries.
    fn entries(&self) -> Vec<(K, V)>;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);
}

/// Port for deriving a client identity from the caller's address.
///
/// The limiter only ever sees `ClientId`s, so the hashing scheme can be
/// swapped without touching the counting logic.
pub trait IdentityExtractor: Send + Sync + Debug {
    /// Map a network address string to a client identity.
    fn identify(&self, address: &str) -> ClientId;
}

/// Port for the on-disk snapshot used for durability and fallback reads.
///
/// Implementations must never surface a missing or malformed snapshot as an
/// error: both read as an empty document.
pub trait SnapshotStore: Send + Sync + Debug {
    /// Set `key → value` in the persisted document.
    ///
    /// # Errors
    /// Returns an error only when the document cannot be written back.
    fn flush(&self, key: &str, value: &Value) -> Result<(), PersistenceError>;

    /// Read a single key from the persisted document.
    fn fallback_get(&self, key: &str) -> Option<Value>;

    /// Read the whole persisted document.
    fn load_all(&self) -> Document;
}

//! In-memory snapshot for testing.

use crate::application::ports::{Document, PersistenceError, SnapshotStore};
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Snapshot kept in memory instead of on disk.
///
/// Clones share the same document, so a clone handed to a store can be
/// inspected from the test. Writes can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    document: Arc<Mutex<Document>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySnapshot {
    /// Create an empty in-memory snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `flush` fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Number of keys in the document.
    pub fn len(&self) -> usize {
        self.document
            .lock()
            .expect("MemorySnapshot mutex poisoned - a test thread panicked while holding the lock")
            .len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshot {
    fn flush(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(PersistenceError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated write failure",
            )));
        }
        self.document
            .lock()
            .expect("MemorySnapshot mutex poisoned - a test thread panicked while holding the lock")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn fallback_get(&self, key: &str) -> Option<Value> {
        self.document
            .lock()
            .expect("MemorySnapshot mutex poisoned - a test thread panicked while holding the lock")
            .get(key)
            .cloned()
    }

    fn load_all(&self) -> Document {
        self.document
            .lock()
            .expect("MemorySnapshot mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }
}

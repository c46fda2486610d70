//! The shared store at the center of the system.
//!
//! The store owns two independent namespaces:
//! - `data`: arbitrary application key/value pairs
//! - `counters`: one request counter per rate-limited client
//!
//! Each namespace is backed by its own `Storage` implementation, so counter
//! traffic and data traffic never wait on each other's locks. All mutation of
//! either namespace goes through the methods on [`Store`].

use crate::application::metrics::Metrics;
use crate::application::ports::{SnapshotStore, Storage};
use crate::domain::client_id::ClientId;
use crate::infrastructure::storage::ShardedStorage;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Concurrency-safe key/value and counter store.
///
/// The store is constructed explicitly and shared by `Arc` with every
/// collaborator that needs it, so independent stores can coexist (e.g. in
/// parallel tests).
///
/// This type is generic over the data namespace's storage, allowing a
/// different backend to be plugged in. In production, use the default
/// `ShardedStorage`.
#[derive(Debug)]
pub struct Store<D = ShardedStorage<String, Value>>
where
    D: Storage<String, Value>,
{
    data: D,
    counters: ShardedStorage<ClientId, u64>,
    snapshot: Option<Arc<dyn SnapshotStore>>,
    metrics: Metrics,
}

impl Store {
    /// Create an empty store with sharded in-memory namespaces and no
    /// snapshot fallback.
    pub fn new() -> Self {
        Self::with_storage(ShardedStorage::new())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Store<D>
where
    D: Storage<String, Value>,
{
    /// Create an empty store over a custom data storage.
    pub fn with_storage(data: D) -> Self {
        Self {
            data,
            counters: ShardedStorage::new(),
            snapshot: None,
            metrics: Metrics::new(),
        }
    }

    /// Attach the snapshot consulted when a data lookup cannot complete.
    pub fn with_snapshot(mut self, snapshot: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Insert or overwrite a value.
    pub fn put(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        tracing::trace!(key = %key, "put");
        self.data.insert(key, value);
    }

    /// Insert or overwrite every pair of a batch.
    ///
    /// Each pair is applied independently; the batch is not atomic as a whole.
    pub fn put_many<I, K>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut written = 0;
        for (key, value) in entries {
            self.data.insert(key.into(), value);
            written += 1;
        }
        tracing::debug!(count = written, "batch put");
        written
    }

    /// Look up a value.
    ///
    /// A missing key is `None`. If the in-memory lookup itself fails (the
    /// storage reports corruption, or panics), the snapshot is asked for the
    /// same key before giving up.
    ///
    /// The fallback read runs synchronously on the calling thread and is not
    /// bounded by a timeout. With a file snapshot it blocks on disk I/O, so
    /// async callers over a storage that can fail should move the call to
    /// the blocking pool.
    pub fn get(&self, key: &str) -> Option<Value> {
        let key = key.to_string();
        let lookup = panic::catch_unwind(AssertUnwindSafe(|| self.data.get(&key)));

        match lookup {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "data lookup failed, trying snapshot");
                self.fallback_get(&key)
            }
            Err(_) => {
                tracing::warn!(key = %key, "data lookup panicked, trying snapshot");
                self.fallback_get(&key)
            }
        }
    }

    fn fallback_get(&self, key: &str) -> Option<Value> {
        let snapshot = self.snapshot.as_ref()?;
        self.metrics.record_fallback_read();
        snapshot.fallback_get(key)
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        if self.data.remove(&key.to_string()).is_some() {
            tracing::trace!(key = %key, "deleted");
        }
    }

    /// Point-in-time copy of the data namespace.
    pub fn list_data(&self) -> Vec<(String, Value)> {
        self.data.entries()
    }

    /// Point-in-time copy of the data keys.
    pub fn list_data_keys(&self) -> Vec<String> {
        self.data.keys()
    }

    /// Delete every data entry present when the call starts.
    ///
    /// Keys removed concurrently by someone else are skipped. Returns the
    /// number of entries this call removed.
    pub fn purge_data(&self) -> usize {
        let removed = self
            .data
            .keys()
            .into_iter()
            .filter(|key| self.data.remove(key).is_some())
            .count();
        tracing::debug!(removed, "purged data namespace");
        removed
    }

    /// Number of entries in the data namespace.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Current counter for a client.
    pub fn counter_get(&self, client: ClientId) -> Option<u64> {
        // The sharded counter storage never reports corruption.
        self.counters.get(&client).ok().flatten()
    }

    /// Overwrite a client's counter.
    pub fn counter_set(&self, client: ClientId, value: u64) {
        self.counters.insert(client, value);
    }

    /// Remove a client's counter. Removing an absent counter is a no-op.
    pub fn counter_delete(&self, client: ClientId) {
        self.counters.remove(&client);
    }

    /// Read-modify-write a client's counter under the namespace lock.
    ///
    /// An absent counter starts at zero and is created by this call.
    pub fn counter_update<F, R>(&self, client: ClientId, f: F) -> R
    where
        F: FnOnce(&mut u64) -> R,
    {
        self.counters.with_entry_mut(client, || 0, f)
    }

    /// Remove a client's counter if the predicate holds for its value.
    pub fn counter_remove_if<F>(&self, client: ClientId, predicate: F) -> bool
    where
        F: FnOnce(u64) -> bool,
    {
        self.counters.remove_if(&client, |value| predicate(*value))
    }

    /// Point-in-time copy of the counter keys.
    pub fn list_counter_keys(&self) -> Vec<ClientId> {
        self.counters.keys()
    }

    /// Number of tracked clients.
    pub fn counter_len(&self) -> usize {
        self.counters.len()
    }

    /// Load every key of the snapshot into the data namespace.
    ///
    /// Existing in-memory values for the same keys are overwritten. Returns
    /// the number of entries restored (zero without a snapshot).
    pub fn restore_from_snapshot(&self) -> usize {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return 0;
        };
        let restored = self.put_many(snapshot.load_all());
        tracing::info!(restored, "restored data from snapshot");
        restored
    }

    /// The snapshot attached to this store, if any.
    pub fn snapshot(&self) -> Option<&Arc<dyn SnapshotStore>> {
        self.snapshot.as_ref()
    }

    /// Get observability metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

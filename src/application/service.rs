//! Request-level facade over the store, limiter, sweeper and snapshot.
//!
//! `KvService` is what a transport (HTTP handler, CLI, queue worker) calls.
//! It gives writes their rate limit and optional persistence, and gives reads
//! their "Not found" rendering, without knowing anything about the transport.

use crate::application::limiter::RateLimiter;
use crate::application::metrics::Metrics;
use crate::application::ports::{IdentityExtractor, PersistenceError, SnapshotStore};
use crate::application::store::Store;
use crate::application::sweeper::{
    ShutdownError, Sweeper, SweeperConfig, SweeperConfigError, SweeperHandle,
};
use crate::domain::quota::{Quota, QuotaError};
use crate::infrastructure::snapshot::JsonSnapshotFile;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Body returned to a throttled writer.
pub const THROTTLED_MESSAGE: &str = "Try after some time";

/// Body returned for a lookup of an unknown key.
pub const NOT_FOUND_MESSAGE: &str = "Not found";

/// A write submitted by a client.
///
/// Decodes from `{"key": ..., "value": ..., "persist": ...}`; `persist` may
/// be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PutRequest {
    /// Key to write
    pub key: String,
    /// Value to store
    pub value: Value,
    /// Also write the pair to the snapshot
    #[serde(default)]
    pub persist: bool,
}

impl PutRequest {
    /// A write kept in memory only.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            persist: false,
        }
    }

    /// Also flush this write to the snapshot.
    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }
}

/// Result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The value is in the store. `persisted` is true only when a requested
    /// flush completed.
    Stored { persisted: bool },
    /// The client has used up its quota; nothing was written
    Throttled,
}

impl PutOutcome {
    /// Check if the write was applied.
    pub fn is_stored(&self) -> bool {
        matches!(self, PutOutcome::Stored { .. })
    }

    /// Check if the write was rejected by the rate limiter.
    pub fn is_throttled(&self) -> bool {
        matches!(self, PutOutcome::Throttled)
    }

    /// HTTP-style status code for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            PutOutcome::Stored { .. } => 200,
            PutOutcome::Throttled => 400,
        }
    }

    /// Response body for this outcome.
    pub fn message(&self) -> &'static str {
        match self {
            PutOutcome::Stored { .. } => "",
            PutOutcome::Throttled => THROTTLED_MESSAGE,
        }
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    /// The key holds this value
    Found(Value),
    /// The key is unknown
    NotFound,
}

impl GetOutcome {
    /// Check if a value was found.
    pub fn is_found(&self) -> bool {
        matches!(self, GetOutcome::Found(_))
    }

    /// Convert into an `Option`.
    pub fn into_value(self) -> Option<Value> {
        match self {
            GetOutcome::Found(value) => Some(value),
            GetOutcome::NotFound => None,
        }
    }
}

impl From<Option<Value>> for GetOutcome {
    fn from(value: Option<Value>) -> Self {
        value.map_or(GetOutcome::NotFound, GetOutcome::Found)
    }
}

/// Renders a response body: strings as-is, other values as JSON.
impl fmt::Display for GetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetOutcome::Found(Value::String(s)) => f.write_str(s),
            GetOutcome::Found(value) => write!(f, "{}", value),
            GetOutcome::NotFound => f.write_str(NOT_FOUND_MESSAGE),
        }
    }
}

/// Error returned when building a `KvService` fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Rate limit validation failed
    Quota(QuotaError),
    /// Sweeper configuration validation failed
    SweeperConfig(SweeperConfigError),
    /// I/O timeout must be greater than zero
    ZeroIoTimeout,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Quota(e) => write!(f, "rate limit error: {}", e),
            BuildError::SweeperConfig(e) => write!(f, "sweeper configuration error: {}", e),
            BuildError::ZeroIoTimeout => write!(f, "io_timeout must be greater than 0"),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<QuotaError> for BuildError {
    fn from(e: QuotaError) -> Self {
        BuildError::Quota(e)
    }
}

impl From<SweeperConfigError> for BuildError {
    fn from(e: SweeperConfigError) -> Self {
        BuildError::SweeperConfig(e)
    }
}

/// Builder for constructing a `KvService`.
#[derive(Debug)]
pub struct KvServiceBuilder {
    rate_limit: u64,
    sweep_interval: Duration,
    sweep_limit: Option<u64>,
    snapshot: Option<Arc<dyn SnapshotStore>>,
    io_timeout: Duration,
    identity: Option<Arc<dyn IdentityExtractor>>,
    restore_on_start: bool,
}

impl KvServiceBuilder {
    /// Create a builder with defaults:
    ///
    /// - rate limit: 2 writes per client
    /// - sweep interval: 30 seconds
    /// - sweep limit: same as the rate limit
    /// - snapshot: `dump.json` in the working directory
    /// - I/O timeout: 5 seconds
    /// - identity: hash of the full address string
    /// - restore on start: off
    pub fn new() -> Self {
        Self {
            rate_limit: 2,
            sweep_interval: Duration::from_secs(30),
            sweep_limit: None,
            snapshot: None,
            io_timeout: Duration::from_secs(5),
            identity: None,
            restore_on_start: false,
        }
    }

    /// Set how many writes each client may make before it is throttled.
    pub fn with_rate_limit(mut self, limit: u64) -> Self {
        self.rate_limit = limit;
        self
    }

    /// Set how often exhausted counters are swept.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the counter value at which the sweeper evicts a client.
    pub fn with_sweep_limit(mut self, limit: u64) -> Self {
        self.sweep_limit = Some(limit);
        self
    }

    /// Persist to a JSON file at `path`.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(Arc::new(JsonSnapshotFile::new(path)));
        self
    }

    /// Persist through a custom snapshot adapter.
    pub fn with_snapshot_store(mut self, snapshot: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Bound every snapshot flush by `timeout`.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Replace how caller addresses map to client identities.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityExtractor>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Load the snapshot into memory when the service is built.
    pub fn with_restore_on_start(mut self, restore: bool) -> Self {
        self.restore_on_start = restore;
        self
    }

    /// Build the service.
    ///
    /// # Errors
    /// Returns `BuildError` if the configuration is invalid.
    pub fn build(self) -> Result<KvService, BuildError> {
        let quota = Quota::new(self.rate_limit)?;
        let sweeper_config = SweeperConfig::new(
            self.sweep_interval,
            self.sweep_limit.unwrap_or(self.rate_limit),
        )?;
        if self.io_timeout.is_zero() {
            return Err(BuildError::ZeroIoTimeout);
        }

        let snapshot = self
            .snapshot
            .unwrap_or_else(|| Arc::new(JsonSnapshotFile::default()));
        let store = Arc::new(Store::new().with_snapshot(Arc::clone(&snapshot)));

        if self.restore_on_start {
            store.restore_from_snapshot();
        }

        let mut limiter = RateLimiter::new(Arc::clone(&store), quota);
        if let Some(identity) = self.identity {
            limiter = limiter.with_identity(identity);
        }

        tracing::debug!(
            rate_limit = quota.limit(),
            sweep_interval = ?sweeper_config.interval,
            sweep_limit = sweeper_config.limit,
            io_timeout = ?self.io_timeout,
            "built kv service"
        );

        Ok(KvService {
            store,
            limiter,
            snapshot,
            io_timeout: self.io_timeout,
            sweeper_config,
            sweeper: Mutex::new(None),
        })
    }
}

impl Default for KvServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate-limited key/value service with best-effort persistence.
#[derive(Debug)]
pub struct KvService {
    store: Arc<Store>,
    limiter: RateLimiter,
    snapshot: Arc<dyn SnapshotStore>,
    io_timeout: Duration,
    sweeper_config: SweeperConfig,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl KvService {
    /// Create a builder for configuring the service.
    pub fn builder() -> KvServiceBuilder {
        KvServiceBuilder::new()
    }

    /// Write a value on behalf of the client at `address`.
    ///
    /// A throttled client writes nothing. A persistence failure never fails
    /// the write: the value stays in memory and the outcome reports
    /// `persisted: false`.
    pub async fn put(&self, address: &str, request: PutRequest) -> PutOutcome {
        if self.limiter.check(address).is_deny() {
            return PutOutcome::Throttled;
        }

        let PutRequest {
            key,
            value,
            persist,
        } = request;

        if !persist {
            self.store.put(key, value);
            return PutOutcome::Stored { persisted: false };
        }

        self.store.put(key.clone(), value.clone());
        let persisted = match self.flush(key.clone(), value).await {
            Ok(()) => true,
            Err(e) => {
                self.metrics().record_flush_failure();
                tracing::warn!(key = %key, error = %e, "write kept in memory only");
                false
            }
        };

        PutOutcome::Stored { persisted }
    }

    /// Write `key → value` to the snapshot on the blocking pool.
    ///
    /// # Errors
    /// Returns `PersistenceError::Timeout` if the write does not finish
    /// within the I/O timeout. The write itself is not cancelled and may
    /// still land later.
    pub async fn flush(&self, key: String, value: Value) -> Result<(), PersistenceError> {
        let snapshot = Arc::clone(&self.snapshot);
        let task = tokio::task::spawn_blocking(move || snapshot.flush(&key, &value));

        match tokio::time::timeout(self.io_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PersistenceError::Join(e.to_string())),
            Err(_) => Err(PersistenceError::Timeout(self.io_timeout)),
        }
    }

    /// Look up a key.
    ///
    /// Unlike [`KvService::flush`], this does no bounded I/O: it runs on the
    /// calling thread. The service's data storage is the in-memory
    /// `ShardedStorage`, whose lookups never fail, so the store's blocking
    /// snapshot fallback is never taken from here and the snapshot file is
    /// not read.
    pub fn get(&self, key: &str) -> GetOutcome {
        self.store.get(key).into()
    }

    /// Start the background sweeper on the current tokio runtime.
    ///
    /// Returns false if it is already running.
    pub fn start_sweeper(&self) -> bool {
        let mut slot = self
            .sweeper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return false;
        }
        let sweeper = Sweeper::new(Arc::clone(&self.store), self.sweeper_config.clone());
        *slot = Some(sweeper.start());
        true
    }

    /// Run one sweep pass immediately.
    pub fn sweep_now(&self) -> usize {
        Sweeper::new(Arc::clone(&self.store), self.sweeper_config.clone()).sweep_once()
    }

    /// Stop the background sweeper if it is running.
    ///
    /// # Errors
    /// Returns `ShutdownError` if the sweeper task panicked or was cancelled.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match handle {
            Some(handle) => handle.shutdown().await,
            None => Ok(()),
        }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Get a reference to the rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Get a reference to the snapshot adapter.
    pub fn snapshot(&self) -> &Arc<dyn SnapshotStore> {
        &self.snapshot
    }

    /// Get the sweeper configuration.
    pub fn sweeper_config(&self) -> &SweeperConfig {
        &self.sweeper_config
    }

    /// Get the snapshot I/O timeout.
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Get observability metrics.
    pub fn metrics(&self) -> &Metrics {
        self.store.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MemorySnapshot;
    use serde_json::json;

    fn service_with(snapshot: &MemorySnapshot) -> KvService {
        KvService::builder()
            .with_snapshot_store(Arc::new(snapshot.clone()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_third_write_is_throttled() {
        let service = service_with(&MemorySnapshot::new());

        let first = service.put("10.0.0.1", PutRequest::new("a", json!(1))).await;
        let second = service.put("10.0.0.1", PutRequest::new("b", json!(2))).await;
        let third = service.put("10.0.0.1", PutRequest::new("c", json!(3))).await;

        assert_eq!(first, PutOutcome::Stored { persisted: false });
        assert_eq!(second, PutOutcome::Stored { persisted: false });
        assert_eq!(third, PutOutcome::Throttled);
        assert_eq!(third.status_code(), 400);
        assert_eq!(third.message(), "Try after some time");

        assert_eq!(service.get("b"), GetOutcome::Found(json!(2)));
        assert_eq!(service.get("c"), GetOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_persisted_write_reaches_snapshot() {
        let snapshot = MemorySnapshot::new();
        let service = service_with(&snapshot);

        let outcome = service
            .put("10.0.0.1", PutRequest::new("k", json!({"v": 1})).persisted())
            .await;

        assert_eq!(outcome, PutOutcome::Stored { persisted: true });
        assert_eq!(snapshot.fallback_get("k"), Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_value_in_memory() {
        let snapshot = MemorySnapshot::new();
        snapshot.fail_writes(true);
        let service = service_with(&snapshot);

        let outcome = service
            .put("10.0.0.1", PutRequest::new("k", json!("v")).persisted())
            .await;

        assert_eq!(outcome, PutOutcome::Stored { persisted: false });
        assert_eq!(outcome.status_code(), 200);
        assert_eq!(service.get("k"), GetOutcome::Found(json!("v")));
        assert!(snapshot.is_empty());
        assert_eq!(service.metrics().flush_failures(), 1);
    }

    #[tokio::test]
    async fn test_slow_flush_times_out() {
        #[derive(Debug)]
        struct SlowSnapshot;

        impl SnapshotStore for SlowSnapshot {
            fn flush(&self, _key: &str, _value: &Value) -> Result<(), PersistenceError> {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            }

            fn fallback_get(&self, _key: &str) -> Option<Value> {
                None
            }

            fn load_all(&self) -> crate::application::ports::Document {
                crate::application::ports::Document::new()
            }
        }

        let service = KvService::builder()
            .with_snapshot_store(Arc::new(SlowSnapshot))
            .with_io_timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let result = service.flush("k".to_string(), json!(1)).await;
        assert!(matches!(result, Err(PersistenceError::Timeout(_))));

        let outcome = service
            .put("10.0.0.1", PutRequest::new("k", json!(1)).persisted())
            .await;
        assert_eq!(outcome, PutOutcome::Stored { persisted: false });
    }

    #[test]
    fn test_get_never_reads_snapshot() {
        #[derive(Debug)]
        struct UnreadableSnapshot;

        impl SnapshotStore for UnreadableSnapshot {
            fn flush(&self, _key: &str, _value: &Value) -> Result<(), PersistenceError> {
                Ok(())
            }

            fn fallback_get(&self, key: &str) -> Option<Value> {
                panic!("snapshot read for {:?} on the request path", key);
            }

            fn load_all(&self) -> crate::application::ports::Document {
                panic!("snapshot loaded on the request path");
            }
        }

        let service = KvService::builder()
            .with_snapshot_store(Arc::new(UnreadableSnapshot))
            .build()
            .unwrap();

        service.store().put("present", json!(1));
        assert_eq!(service.get("present"), GetOutcome::Found(json!(1)));
        assert_eq!(service.get("absent"), GetOutcome::NotFound);
        assert_eq!(service.metrics().fallback_reads(), 0);
    }

    #[test]
    fn test_not_found_rendering() {
        let service = service_with(&MemorySnapshot::new());

        assert_eq!(service.get("missing").to_string(), "Not found");

        service.store().put("s", json!("plain"));
        service.store().put("n", json!({"a": 1}));
        assert_eq!(service.get("s").to_string(), "plain");
        assert_eq!(service.get("n").to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn test_put_request_decoding() {
        let request: PutRequest = serde_json::from_str(r#"{"key": "a", "value": [1, 2]}"#).unwrap();
        assert_eq!(request, PutRequest::new("a", json!([1, 2])));

        let request: PutRequest =
            serde_json::from_str(r#"{"key": "a", "value": 1, "persist": true}"#).unwrap();
        assert!(request.persist);
    }

    #[test]
    fn test_builder_defaults() {
        let service = KvService::builder()
            .with_snapshot_store(Arc::new(MemorySnapshot::new()))
            .build()
            .unwrap();

        assert_eq!(service.limiter().quota().limit(), 2);
        assert_eq!(service.sweeper_config().interval, Duration::from_secs(30));
        assert_eq!(service.sweeper_config().limit, 2);
        assert_eq!(service.io_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder_sweep_limit_follows_rate_limit() {
        let service = KvService::builder()
            .with_snapshot_store(Arc::new(MemorySnapshot::new()))
            .with_rate_limit(5)
            .build()
            .unwrap();
        assert_eq!(service.sweeper_config().limit, 5);

        let service = KvService::builder()
            .with_snapshot_store(Arc::new(MemorySnapshot::new()))
            .with_rate_limit(5)
            .with_sweep_limit(3)
            .build()
            .unwrap();
        assert_eq!(service.sweeper_config().limit, 3);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        assert!(matches!(
            KvService::builder().with_rate_limit(0).build(),
            Err(BuildError::Quota(QuotaError::ZeroLimit))
        ));
        assert!(matches!(
            KvService::builder()
                .with_sweep_interval(Duration::ZERO)
                .build(),
            Err(BuildError::SweeperConfig(SweeperConfigError::ZeroInterval))
        ));
        assert!(matches!(
            KvService::builder().with_io_timeout(Duration::ZERO).build(),
            Err(BuildError::ZeroIoTimeout)
        ));
    }

    #[test]
    fn test_restore_on_start() {
        let snapshot = MemorySnapshot::new();
        snapshot.flush("saved", &json!(42)).unwrap();

        let cold = service_with(&snapshot);
        assert_eq!(cold.get("saved"), GetOutcome::NotFound);

        let warm = KvService::builder()
            .with_snapshot_store(Arc::new(snapshot.clone()))
            .with_restore_on_start(true)
            .build()
            .unwrap();
        assert_eq!(warm.get("saved"), GetOutcome::Found(json!(42)));
    }

    #[test]
    fn test_sweep_now_readmits_throttled_client() {
        let service = service_with(&MemorySnapshot::new());
        let limiter = service.limiter();

        assert!(limiter.check("10.0.0.9").is_admit());
        assert!(limiter.check("10.0.0.9").is_admit());
        assert!(limiter.check("10.0.0.9").is_deny());

        assert_eq!(service.sweep_now(), 1);
        assert!(limiter.check("10.0.0.9").is_admit());
    }

    #[tokio::test]
    async fn test_start_sweeper_once() {
        let service = service_with(&MemorySnapshot::new());

        assert!(service.start_sweeper());
        assert!(!service.start_sweeper());

        service.shutdown().await.unwrap();
        // A second shutdown has nothing left to stop
        service.shutdown().await.unwrap();

        assert!(service.start_sweeper());
        service.shutdown().await.unwrap();
    }
}

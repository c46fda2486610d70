//! # kv-throttle
//!
//! An in-process key/value store with per-client write throttling, background
//! eviction of exhausted counters, and best-effort persistence to a JSON
//! snapshot file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kv_throttle::{GetOutcome, KvService, PutOutcome, PutRequest};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = KvService::builder()
//!     .with_rate_limit(2)                          // two writes per client
//!     .with_sweep_interval(Duration::from_secs(30))
//!     .with_snapshot_path("dump.json")
//!     .build()?;
//!
//! service.start_sweeper();
//!
//! let outcome = service
//!     .put("203.0.113.7:51234", PutRequest::new("greeting", json!("hello")).persisted())
//!     .await;
//! assert_eq!(outcome, PutOutcome::Stored { persisted: true });
//!
//! assert_eq!(service.get("greeting"), GetOutcome::Found(json!("hello")));
//! assert_eq!(service.get("other").to_string(), "Not found");
//!
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! - [`Store`]: two independently locked namespaces, `data` (string keys to
//!   JSON values) and `counters` (client identity to request count). Shared
//!   by `Arc`; there is no global instance.
//! - [`RateLimiter`]: admits a client until its counter equals the limit,
//!   then denies until the counter is reset or swept. Counters never decay
//!   with time.
//! - [`Sweeper`]: a tokio task that periodically removes every counter at or
//!   above a limit.
//! - [`JsonSnapshotFile`]: the on-disk snapshot. Flushes rewrite the whole
//!   document atomically; a missing or malformed file reads as empty.
//! - [`KvService`]: the facade a transport calls, with the builder that wires
//!   everything together.
//!
//! ## Throttling
//!
//! The limit is count-based, not time-based. With the default limit of 2:
//!
//! ```rust
//! use kv_throttle::{Quota, RateLimiter, Store};
//! use std::sync::Arc;
//!
//! let limiter = RateLimiter::new(Arc::new(Store::new()), Quota::new(2).unwrap());
//!
//! assert!(limiter.check("10.0.0.1").is_admit());
//! assert!(limiter.check("10.0.0.1").is_admit());
//! assert!(limiter.check("10.0.0.1").is_deny());
//!
//! // Readmitted once the counter is gone
//! limiter.reset_address("10.0.0.1");
//! assert!(limiter.check("10.0.0.1").is_admit());
//! ```
//!
//! ## Persistence
//!
//! Persistence is best-effort. A failed or timed-out flush leaves the value
//! in memory and reports `PutOutcome::Stored { persisted: false }`. Reads
//! only consult the snapshot when the in-memory lookup itself fails, or at
//! start-up with `with_restore_on_start(true)`.
//!
//! ## Observability
//!
//! All components log through `tracing`. Counters are available from
//! [`Metrics`]:
//!
//! ```rust,no_run
//! # use kv_throttle::KvService;
//! # let service = KvService::builder().build().unwrap();
//! let snapshot = service.metrics().snapshot();
//! println!("Denial rate: {:.2}%", snapshot.denial_rate() * 100.0);
//! println!("Failed flushes: {}", snapshot.flush_failures);
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    client_id::ClientId,
    quota::{AdmitDecision, Quota, QuotaError},
};

pub use application::{
    limiter::RateLimiter,
    metrics::{Metrics, MetricsSnapshot},
    ports::{
        Document, IdentityExtractor, PersistenceError, SnapshotStore, Storage, StorageError,
    },
    service::{
        BuildError, GetOutcome, KvService, KvServiceBuilder, PutOutcome, PutRequest,
        NOT_FOUND_MESSAGE, THROTTLED_MESSAGE,
    },
    store::Store,
    sweeper::{ShutdownError, Sweeper, SweeperConfig, SweeperConfigError, SweeperHandle},
};

pub use infrastructure::{
    identity::AddressHash,
    snapshot::{JsonSnapshotFile, SnapshotRead, DEFAULT_SNAPSHOT_PATH},
    storage::ShardedStorage,
};

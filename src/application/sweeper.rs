//! Background eviction of exhausted rate counters.
//!
//! The sweeper periodically removes every counter that has reached the
//! configured limit, bounding the counter namespace as clients churn. It
//! never touches the data namespace and reports nothing back to callers.

use crate::application::ports::Storage;
use crate::application::store::Store;
use crate::infrastructure::storage::ShardedStorage;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Error returned when sweeper configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweeperConfigError {
    /// Sweep interval duration must be greater than zero
    ZeroInterval,
}

impl fmt::Display for SweeperConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweeperConfigError::ZeroInterval => {
                write!(f, "sweep interval must be greater than 0")
            }
        }
    }
}

impl std::error::Error for SweeperConfigError {}

/// Error returned when the sweeper task does not stop cleanly.
#[derive(Debug)]
pub enum ShutdownError {
    /// The sweeper task panicked
    TaskPanicked(String),
    /// The sweeper task was cancelled before it could stop
    TaskCancelled,
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownError::TaskPanicked(reason) => write!(f, "sweeper task panicked: {}", reason),
            ShutdownError::TaskCancelled => write!(f, "sweeper task was cancelled"),
        }
    }
}

impl std::error::Error for ShutdownError {}

impl From<tokio::task::JoinError> for ShutdownError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_panic() {
            ShutdownError::TaskPanicked(e.to_string())
        } else {
            ShutdownError::TaskCancelled
        }
    }
}

/// Configuration for the sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// How often to sweep
    pub interval: Duration,
    /// Counters at or above this value are removed
    pub limit: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            limit: 2,
        }
    }
}

impl SweeperConfig {
    /// Create a new sweeper config.
    ///
    /// # Errors
    /// Returns `SweeperConfigError::ZeroInterval` if `interval` is zero.
    pub fn new(interval: Duration, limit: u64) -> Result<Self, SweeperConfigError> {
        if interval.is_zero() {
            return Err(SweeperConfigError::ZeroInterval);
        }
        Ok(Self { interval, limit })
    }
}

/// Periodically evicts counters at or above a limit.
pub struct Sweeper<D = ShardedStorage<String, Value>>
where
    D: Storage<String, Value>,
{
    store: Arc<Store<D>>,
    config: SweeperConfig,
}

impl<D> Sweeper<D>
where
    D: Storage<String, Value>,
{
    /// Create a new sweeper over a shared store.
    pub fn new(store: Arc<Store<D>>, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    /// Run one sweep pass and return how many counters were removed.
    ///
    /// The key list is a snapshot. A counter deleted or reset by someone else
    /// after the snapshot is skipped; the value check and the removal of each
    /// counter happen under that counter's lock.
    pub fn sweep_once(&self) -> usize {
        let limit = self.config.limit;
        let removed = self
            .store
            .list_counter_keys()
            .into_iter()
            .filter(|client| self.store.counter_remove_if(*client, |count| count >= limit))
            .count();

        self.store.metrics().record_swept(removed as u64);
        tracing::debug!(
            removed,
            remaining = self.store.counter_len(),
            limit,
            "sweep pass finished"
        );
        removed
    }

    /// Get the sweeper configuration.
    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &Arc<Store<D>> {
        &self.store
    }
}

impl<D> Sweeper<D>
where
    D: Storage<String, Value> + 'static,
{
    /// Start sweeping periodically on the current tokio runtime.
    ///
    /// The first pass runs immediately, then one per interval. Dropping the
    /// returned handle does not stop the task; call
    /// [`SweeperHandle::shutdown`] for that.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join_handle = tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut handle_alive = true;

            tracing::info!(interval = ?self.config.interval, limit = self.config.limit, "sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    changed = shutdown_rx.changed(), if handle_alive => {
                        match changed {
                            Ok(()) if *shutdown_rx.borrow() => break,
                            Ok(()) => {}
                            // Handle dropped: keep sweeping until the runtime stops.
                            Err(_) => handle_alive = false,
                        }
                    }
                }
            }

            tracing::info!("sweeper stopped");
        });

        SweeperHandle {
            shutdown_tx,
            join_handle,
        }
    }
}

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the task to finish.
    ///
    /// # Errors
    /// Returns an error if the task panicked or was cancelled.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        // The task may already be gone; a failed send is reported by the join.
        let _ = self.shutdown_tx.send(true);
        self.join_handle.await?;
        Ok(())
    }

    /// Check if the sweeper task has finished.
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

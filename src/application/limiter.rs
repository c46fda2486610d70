//! Rate limiter coordination logic.
//!
//! The rate limiter decides whether a unit of work tagged with a client
//! identity may proceed, counting requests in the store's counter namespace.
//! It is a counting limiter: a counter never decays, it only disappears when
//! it is reset or swept.

use crate::application::metrics::Metrics;
use crate::application::ports::{IdentityExtractor, Storage};
use crate::application::store::Store;
use crate::domain::client_id::ClientId;
use crate::domain::quota::{AdmitDecision, Quota};
use crate::infrastructure::identity::AddressHash;
use crate::infrastructure::storage::ShardedStorage;
use serde_json::Value;
use std::sync::Arc;

/// Coordinates admission decisions over a shared store.
pub struct RateLimiter<D = ShardedStorage<String, Value>>
where
    D: Storage<String, Value>,
{
    store: Arc<Store<D>>,
    identity: Arc<dyn IdentityExtractor>,
    quota: Quota,
}

impl<D> Clone for RateLimiter<D>
where
    D: Storage<String, Value>,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            identity: Arc::clone(&self.identity),
            quota: self.quota,
        }
    }
}

impl<D> std::fmt::Debug for RateLimiter<D>
where
    D: Storage<String, Value>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("identity", &self.identity)
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

impl<D> RateLimiter<D>
where
    D: Storage<String, Value>,
{
    /// Create a new rate limiter hashing full caller addresses.
    ///
    /// # Arguments
    /// * `store` - The shared store whose counter namespace is used
    /// * `quota` - Requests each client may make until reset or swept
    pub fn new(store: Arc<Store<D>>, quota: Quota) -> Self {
        Self {
            store,
            identity: Arc::new(AddressHash::new()),
            quota,
        }
    }

    /// Replace the identity extraction strategy.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityExtractor>) -> Self {
        self.identity = identity;
        self
    }

    /// Decide for a request coming from `address` under the configured quota.
    pub fn check(&self, address: &str) -> AdmitDecision {
        let client = self.identity.identify(address);
        self.check_client(client)
    }

    /// Decide for a known client under the configured quota.
    pub fn check_client(&self, client: ClientId) -> AdmitDecision {
        if self.admit(client, self.quota.limit()) {
            AdmitDecision::Admit
        } else {
            AdmitDecision::Deny
        }
    }

    /// Admit `client` unless its counter equals `limit`.
    ///
    /// An admitted request increments the counter (absent counts as zero);
    /// a denied request leaves it untouched. The read and the increment
    /// happen under the counter namespace lock, so concurrent requests from
    /// the same client cannot lose increments.
    pub fn admit(&self, client: ClientId, limit: u64) -> bool {
        // An absent counter already equals a zero limit; deny without creating it.
        if limit == 0 && self.store.counter_get(client).unwrap_or(0) == 0 {
            return self.record(client, AdmitDecision::Deny);
        }

        let decision = self
            .store
            .counter_update(client, |count| Quota::register_with_limit(limit, count));
        self.record(client, decision)
    }

    fn record(&self, client: ClientId, decision: AdmitDecision) -> bool {
        match decision {
            AdmitDecision::Admit => {
                self.metrics().record_admitted();
                tracing::trace!(client = %client, "request admitted");
                true
            }
            AdmitDecision::Deny => {
                self.metrics().record_denied();
                tracing::debug!(client = %client, "request denied, quota exhausted");
                false
            }
        }
    }

    /// Forget a client's counter; its next request is treated as its first.
    pub fn reset(&self, client: ClientId) {
        self.store.counter_delete(client);
    }

    /// Forget the counter of the client behind `address`.
    pub fn reset_address(&self, address: &str) {
        self.reset(self.identity.identify(address));
    }

    /// Current request count for a client (zero when untracked).
    pub fn count(&self, client: ClientId) -> u64 {
        self.store.counter_get(client).unwrap_or(0)
    }

    /// Identity the limiter assigns to `address`.
    pub fn identify(&self, address: &str) -> ClientId {
        self.identity.identify(address)
    }

    /// Get the configured quota.
    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &Arc<Store<D>> {
        &self.store
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        self.store.metrics()
    }
}

//! Client identity used as the rate limiter's counting key.
//!
//! A `ClientId` is derived from a caller's network address by hashing the
//! address string. Two distinct addresses may collide onto the same id; the
//! limiter then counts them as one client. This is a known limitation of
//! address-hash identity and no collision resistance is layered on top.

use ahash::AHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque identity of a rate-limited client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Derive an identity from a network address string.
    ///
    /// `AHasher::default()` uses fixed keys, so the same address maps to the
    /// same id for the whole process lifetime.
    pub fn from_address(address: &str) -> Self {
        let mut hasher = AHasher::default();
        address.hash(&mut hasher);
        ClientId(hasher.finish())
    }

    /// Create an identity from a raw hash value.
    pub fn from_raw(raw: u64) -> Self {
        ClientId(raw)
    }

    /// Get the raw hash value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

//! Infrastructure layer - external adapters.
//!
//! This layer provides adapters for:
//! - Storage implementations (sharded maps)
//! - Client identity extraction
//! - JSON file snapshots

pub mod identity;
pub mod snapshot;
pub mod storage;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for the
/// store's fallback and persistence paths.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// kv-throttle = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;

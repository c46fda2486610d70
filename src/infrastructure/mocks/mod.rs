//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling controlled testing of degraded paths.

pub mod snapshot;
pub mod storage;

pub use snapshot::MemorySnapshot;
pub use storage::CorruptedStorage;

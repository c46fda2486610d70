//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Store (data and counter namespaces)
//! - Rate limiter (admission decisions)
//! - Sweeper (periodic counter eviction)
//! - Service facade (request-level put/get)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod store;
pub mod sweeper;

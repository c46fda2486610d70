//! Domain layer - pure business logic with no external dependencies.
//!
//! This layer contains the core concepts of request throttling:
//! - Client identity
//! - Count-based quotas and admission decisions
//!
//! All types in this layer are pure and easily testable.

pub mod client_id;
pub mod quota;

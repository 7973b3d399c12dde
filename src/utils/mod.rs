//! Shared utilities.
//!
//! - [`identifier`] - Process-wide monotonic identifiers
//! - [`sync`] - Owner-tracking locks for caches built on top of field enumeration

pub mod identifier;
pub mod sync;

//! Domain layer - Core relay types with no I/O dependencies.

/// Quote snapshot types.
pub mod quote;

/// Subscription tracking and connection lifecycle.
pub mod subscription;

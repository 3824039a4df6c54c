//! Application layer - Use cases and port definitions.

/// Ports (interfaces) between the scheduler and the upstream provider.
pub mod ports;

/// Batch scheduling and periodic refresh services.
pub mod scheduler;

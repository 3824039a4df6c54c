//! Infrastructure layer - Adapters and external integrations.

/// Broadcast hub for fan-out to connected clients.
pub mod broadcast;

/// Short-TTL quote cache.
pub mod cache;

/// Configuration from environment variables.
pub mod config;

/// HTTP surface: health, metrics, and the one-off REST endpoints.
pub mod http;

/// Instruments reference table (symbol to company name).
pub mod instruments;

/// Prometheus metrics.
pub mod metrics;

/// Tracing initialization.
pub mod telemetry;

/// Groww upstream client and backoff policy.
pub mod upstream;

/// Client-facing WebSocket endpoint.
pub mod ws;

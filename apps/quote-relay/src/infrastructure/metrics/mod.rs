//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Fetches**: Upstream fetch counts by outcome and durations
//! - **Broadcasts**: Price-update events fanned out to clients
//! - **Connections**: Active WebSocket sessions and interest-set size
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the relay HTTP port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Fetch counters
    describe_counter!(
        "relay_fetches_total",
        "Total upstream quote fetches by outcome"
    );
    describe_histogram!(
        "relay_fetch_duration_seconds",
        "Upstream fetch duration, including fallback attempts"
    );

    // Broadcast counters
    describe_counter!(
        "relay_broadcasts_total",
        "Total price-update events broadcast to clients"
    );
    describe_counter!(
        "relay_broadcast_quotes_total",
        "Total quotes carried by broadcast events"
    );
    describe_counter!(
        "relay_events_lagged_total",
        "Total events lost by slow client sessions"
    );

    // Connection gauges
    describe_gauge!(
        "relay_connected_clients",
        "Number of active WebSocket client sessions"
    );
    describe_gauge!(
        "relay_interest_symbols",
        "Number of distinct symbols across all subscriptions"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for fetch outcomes.
#[derive(Debug, Clone, Copy)]
pub enum FetchOutcome {
    /// Primary quote endpoint answered.
    Primary,
    /// LTP fallback endpoint answered.
    Fallback,
    /// Stale cache entry served after both endpoints failed.
    Stale,
    /// Nothing to serve.
    Error,
}

impl FetchOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Stale => "stale",
            Self::Error => "error",
        }
    }
}

/// Record a completed fetch attempt.
pub fn record_fetch(outcome: FetchOutcome) {
    counter!(
        "relay_fetches_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record the duration of an upstream fetch.
pub fn record_fetch_duration(duration: Duration) {
    histogram!("relay_fetch_duration_seconds").record(duration.as_secs_f64());
}

/// Record a price-update event fanned out to clients.
pub fn record_broadcast(quote_count: u64) {
    counter!("relay_broadcasts_total").increment(1);
    counter!("relay_broadcast_quotes_total").increment(quote_count);
}

/// Record events lost by a lagging client session.
pub fn record_events_lagged(count: u64) {
    counter!("relay_events_lagged_total").increment(count);
}

/// Update the connected client count.
pub fn set_connected_clients(count: f64) {
    gauge!("relay_connected_clients").set(count);
}

/// Update the interest-set size.
pub fn set_interest_symbols(count: f64) {
    gauge!("relay_interest_symbols").set(count);
}

// =============================================================================
// Tests
// =============================================================================

//! HTTP Server
//!
//! Serves the REST surface, health checks, Prometheus metrics, and the
//! WebSocket upgrade endpoint on one port.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (instrument directory loaded)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /api/stock?symbol=X` - One-off quote fetch
//! - `GET /api/instruments` - Reload the symbol directory on demand
//! - `GET /ws` - WebSocket upgrade

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{QuoteSource, UpstreamError};
use crate::application::scheduler::BatchScheduler;
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::broadcast::SharedRelayHub;
use crate::infrastructure::cache::QuoteCache;
use crate::infrastructure::instruments::InstrumentTable;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::ws::websocket_handler;

// =============================================================================
// Shared State
// =============================================================================

/// State shared by every HTTP handler and WebSocket session.
pub struct RelayState {
    /// Relay version, reported by `/health`.
    pub version: String,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
    /// Fan-out hub.
    pub hub: SharedRelayHub,
    /// Shared quote cache.
    pub cache: Arc<QuoteCache>,
    /// Per-client subscription registry.
    pub registry: Arc<SubscriptionRegistry>,
    /// Symbol directory.
    pub instruments: Arc<InstrumentTable>,
    /// Upstream quote source.
    pub source: Arc<dyn QuoteSource>,
    /// Paced batch fetcher, shared with sessions for on-subscribe runs.
    pub scheduler: Arc<BatchScheduler>,
    /// Client for the on-demand instrument reload.
    pub http_client: reqwest::Client,
    /// Where the instrument CSV lives.
    pub instruments_url: String,
    /// Shutdown signal observed by long-lived sessions.
    pub cancel: CancellationToken,
}

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded".
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Whether the instrument directory has loaded.
    pub instruments_loaded: bool,
    /// Active WebSocket sessions.
    pub connected_clients: usize,
    /// Symbols with a cache entry.
    pub cached_symbols: usize,
    /// Distinct symbols across all live subscriptions.
    pub interest_symbols: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Serving, but symbol validation is unavailable until the
    /// instrument directory loads.
    Degraded,
}

/// Body of a successful `/api/instruments` reload.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentsResponse {
    /// Instruments loaded into the directory.
    pub count: usize,
}

/// Error body for REST failures.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub error: String,
}

// =============================================================================
// Router
// =============================================================================

/// Build the relay router over shared state.
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/stock", get(stock_handler))
        .route("/api/instruments", get(instruments_handler))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    let instruments_loaded = state.instruments.is_loaded();
    let status = if instruments_loaded {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        instruments_loaded,
        connected_clients: state.registry.connection_count(),
        cached_symbols: state.cache.len(),
        interest_symbols: state.registry.interest_set().len(),
    })
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    if state.instruments.is_loaded() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn stock_handler(
    State(state): State<Arc<RelayState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(symbol) = params.get("symbol").map(|s| s.trim()).filter(|s| !s.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "missing required query parameter: symbol".to_string(),
            }),
        )
            .into_response();
    };

    match state.source.fetch_quote(symbol).await {
        Ok(quote) => (StatusCode::OK, Json(quote)).into_response(),
        Err(err) => {
            let status = match &err {
                UpstreamError::SymbolNotFound { .. } => StatusCode::NOT_FOUND,
                UpstreamError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                UpstreamError::Unavailable { .. } | UpstreamError::Malformed { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            (
                status,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn instruments_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    match state
        .instruments
        .reload(&state.http_client, &state.instruments_url)
        .await
    {
        Ok(count) => (StatusCode::OK, Json(InstrumentsResponse { count })).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "instrument reload failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Server
// =============================================================================

/// The relay HTTP + WebSocket server.
pub struct RelayServer {
    port: u16,
    state: Arc<RelayState>,
    cancel: CancellationToken,
}

impl RelayServer {
    /// Create a server over shared state.
    #[must_use]
    pub const fn new(port: u16, state: Arc<RelayState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RelayServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), RelayServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "relay server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| RelayServerError::ServerFailed(e.to_string()))?;

        tracing::info!("relay server stopped");
        Ok(())
    }
}

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

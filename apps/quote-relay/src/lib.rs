#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Quote Relay - Market Data Fan-Out
//!
//! A WebSocket relay that polls the Groww live-data API for the symbols
//! clients subscribe to, caches recent quotes, and broadcasts every price
//! update to every connected client.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core data types with no external integrations
//!   - `quote`: The normalized quote record
//!   - `subscription`: Per-client subscription tracking
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: The quote source seam between scheduler and upstream
//!   - `scheduler`: Paced batch fetching and periodic refresh
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstream`: Groww HTTP client with the fallback chain
//!   - `cache`: TTL-bounded quote cache
//!   - `instruments`: Symbol directory from the provider CSV
//!   - `broadcast`: Channel-based event distribution
//!   - `ws`: Per-client WebSocket sessions
//!   - `http`: REST surface, health, and metrics
//!   - `config`: Environment-driven configuration
//!
//! # Data Flow
//!
//! ```text
//!                ┌───────────┐     ┌───────────┐     ┌───────────┐
//! Groww API ◄────┤   Batch   │────►│ Broadcast │────►│ WebSocket │──► Client 1
//!    │           │ Scheduler │     │    Hub    │     │ Sessions  │──► Client 2
//!    └──────────►│  + Cache  │     └───────────┘     └───────────┘──► Client N
//!                └───────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core data types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::quote::{Quote, Symbol};
pub use domain::subscription::{ClientId, ConnectionEvent, ConnectionState, SubscriptionRegistry};

// Application layer
pub use application::ports::{QuoteSource, UpstreamError};
pub use application::scheduler::{BatchOutcome, BatchScheduler, Refresher, SchedulerSettings};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, Credentials, RelayConfig, RelaySettings, ServerSettings, UpstreamSettings,
};

// HTTP server (for integration tests)
pub use infrastructure::http::{RelayServer, RelayServerError, RelayState};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{RelayEvent, RelayHub, SharedRelayHub};

// Upstream client
pub use infrastructure::cache::QuoteCache;
pub use infrastructure::instruments::{INSTRUMENTS_CSV_URL, InstrumentError, InstrumentTable};
pub use infrastructure::upstream::GrowwClient;
pub use infrastructure::upstream::backoff::{BackoffConfig, BackoffPolicy};

// Wire protocol (for integration tests)
pub use infrastructure::ws::protocol::{ClientFrame, ServerFrame};

// Metrics
pub use infrastructure::metrics::{FetchOutcome as MetricsFetchOutcome, init_metrics};

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;

//! Quote Relay Binary
//!
//! Starts the market data relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `GROWW_API_KEY`: Groww API access token
//!
//! ## Optional
//! - `GROWW_API_BASE`: Provider base URL (default: <https://api.groww.in>)
//! - `RELAY_HTTP_PORT`: HTTP + WebSocket port (default: 3000)
//! - `RELAY_BATCH_SIZE`: Symbols fetched concurrently per chunk (default: 3)
//! - `RELAY_BATCH_DELAY_MS`: Pacing delay between chunks (default: 500)
//! - `RELAY_CACHE_TTL_SECS`: Quote cache freshness window (default: 5)
//! - `RELAY_REFRESH_INTERVAL_SECS`: Periodic refresh cadence (default: 10)
//! - `RELAY_FETCH_TIMEOUT_SECS`: Upstream request timeout (default: 5)
//! - `RELAY_EVENT_CAPACITY`: Broadcast channel capacity (default: 1024)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use quote_relay::infrastructure::instruments::{INSTRUMENTS_CSV_URL, InstrumentTable};
use quote_relay::infrastructure::telemetry;
use quote_relay::{
    BatchScheduler, GrowwClient, QuoteCache, Refresher, RelayConfig, RelayHub, RelayServer,
    RelayState, SchedulerSettings, SubscriptionRegistry, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    telemetry::init();

    tracing::info!("Starting Quote Relay");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Shared state
    let cache = Arc::new(QuoteCache::new());
    let registry = Arc::new(SubscriptionRegistry::new());
    let hub = Arc::new(RelayHub::new(config.relay.event_capacity));
    let instruments = Arc::new(InstrumentTable::new());

    // Upstream client and scheduler
    let source = Arc::new(
        GrowwClient::new(
            config.upstream.clone(),
            config.credentials.clone(),
            Arc::clone(&cache),
            Arc::clone(&instruments),
        )
        .context("failed to build upstream HTTP client")?,
    );
    let scheduler = Arc::new(BatchScheduler::new(
        Arc::clone(&source) as Arc<dyn quote_relay::QuoteSource>,
        Arc::clone(&hub),
        SchedulerSettings {
            batch_size: config.relay.batch_size,
            batch_delay: config.relay.batch_delay,
            backoff: quote_relay::BackoffConfig::default(),
        },
    ));

    // Instrument directory loads in the background; the relay serves
    // quotes without it, just with symbol validation disabled.
    let instruments_load = Arc::clone(&instruments);
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        match instruments_load.reload(&client, INSTRUMENTS_CSV_URL).await {
            Ok(count) => tracing::info!(count, "instrument directory ready"),
            Err(e) => tracing::warn!(error = %e, "instrument directory unavailable"),
        }
    });

    // Periodic refresher over the interest set
    let refresher = Refresher::new(
        Arc::clone(&registry),
        Arc::clone(&scheduler),
        config.relay.refresh_interval,
        shutdown_token.clone(),
    );
    tokio::spawn(refresher.run());

    // HTTP + WebSocket server
    let state = Arc::new(RelayState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: Instant::now(),
        hub,
        cache,
        registry,
        instruments,
        source,
        scheduler,
        http_client: reqwest::Client::new(),
        instruments_url: INSTRUMENTS_CSV_URL.to_string(),
        cancel: shutdown_token.clone(),
    });
    let server = RelayServer::new(config.server.http_port, state, shutdown_token.clone());
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    tracing::info!("Quote relay ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Quote relay stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        batch_size = config.relay.batch_size,
        batch_delay_ms = config.relay.batch_delay.as_millis() as u64,
        cache_ttl_secs = config.upstream.cache_ttl.as_secs(),
        refresh_interval_secs = config.relay.refresh_interval.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(base_url = %config.upstream.base_url, "Upstream endpoint");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}

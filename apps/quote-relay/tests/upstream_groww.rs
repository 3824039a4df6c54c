//! Upstream Client Integration Tests
//!
//! Runs the Groww client against a local fake provider to exercise the
//! full degradation chain: fresh cache, primary endpoint, LTP fallback,
//! stale cache, and the final error.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use quote_relay::{
    Credentials, GrowwClient, InstrumentTable, Quote, QuoteCache, QuoteSource, UpstreamError,
    UpstreamSettings,
};

/// Controllable fake provider.
#[derive(Default)]
struct FakeGroww {
    primary_down: AtomicBool,
    primary_rate_limited: AtomicBool,
    ltp_down: AtomicBool,
    quote_calls: AtomicUsize,
    ltp_calls: AtomicUsize,
    auth_seen: AtomicBool,
}

async fn quote_handler(
    State(fake): State<Arc<FakeGroww>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    fake.quote_calls.fetch_add(1, Ordering::SeqCst);
    record_auth(&fake, &headers);

    if fake.primary_rate_limited.load(Ordering::SeqCst) {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    if fake.primary_down.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let symbol = params.get("trading_symbol").cloned().unwrap_or_default();
    Json(json!({
        "status": "SUCCESS",
        "payload": {
            "last_price": 2450.75,
            "day_change": 12.5,
            "day_change_perc": 0.51,
            "volume": 1000,
            "ohlc": {"open": 2438.25, "high": 2460.0, "low": 2431.1, "close": 2438.25},
            "symbol": symbol
        }
    }))
    .into_response()
}

async fn ltp_handler(
    State(fake): State<Arc<FakeGroww>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    fake.ltp_calls.fetch_add(1, Ordering::SeqCst);
    record_auth(&fake, &headers);

    if fake.ltp_down.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let exchange_symbol = params
        .get("exchange_symbols")
        .cloned()
        .unwrap_or_default();
    Json(json!({
        "status": "SUCCESS",
        "payload": { exchange_symbol: 2455.0 }
    }))
    .into_response()
}

fn record_auth(fake: &FakeGroww, headers: &HeaderMap) {
    let has_bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    let has_version = headers.contains_key("x-api-version");
    if has_bearer && has_version {
        fake.auth_seen.store(true, Ordering::SeqCst);
    }
}

async fn start_fake() -> (Arc<FakeGroww>, SocketAddr) {
    let fake = Arc::new(FakeGroww::default());
    let app = Router::new()
        .route("/v1/live-data/quote", get(quote_handler))
        .route("/v1/live-data/ltp", get(ltp_handler))
        .with_state(Arc::clone(&fake));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (fake, addr)
}

struct Fixture {
    fake: Arc<FakeGroww>,
    cache: Arc<QuoteCache>,
    instruments: Arc<InstrumentTable>,
    client: GrowwClient,
}

async fn setup(cache_ttl: Duration) -> Fixture {
    let (fake, addr) = start_fake().await;
    let cache = Arc::new(QuoteCache::new());
    let instruments = Arc::new(InstrumentTable::new());
    let client = GrowwClient::new(
        UpstreamSettings {
            base_url: format!("http://{addr}"),
            fetch_timeout: Duration::from_secs(2),
            cache_ttl,
        },
        Credentials::new("test-token".to_string()),
        Arc::clone(&cache),
        Arc::clone(&instruments),
    )
    .unwrap();
    Fixture {
        fake,
        cache,
        instruments,
        client,
    }
}

fn stale_quote(symbol: &str, last: i64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        last: Decimal::new(last, 2),
        change: Decimal::ZERO,
        change_percent: Decimal::ZERO,
        volume: 500,
        high: Decimal::new(last + 100, 2),
        low: Decimal::new(last - 100, 2),
        open: Decimal::new(last, 2),
        previous_close: Decimal::new(last, 2),
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn primary_endpoint_populates_the_cache() {
    let fx = setup(Duration::from_secs(5)).await;

    let quote = fx.client.fetch_quote("RELIANCE").await.unwrap();
    assert_eq!(quote.symbol, "RELIANCE");
    assert_eq!(quote.last, Decimal::new(2_450_75, 2));
    assert_eq!(quote.open, Decimal::new(2_438_25, 2));

    assert!(fx.cache.is_fresh("RELIANCE", Duration::from_secs(5)));
    assert!(fx.fake.auth_seen.load(Ordering::SeqCst));
}

#[tokio::test]
async fn fresh_cache_entry_short_circuits_the_network() {
    let fx = setup(Duration::from_secs(60)).await;

    let first = fx.client.fetch_quote("RELIANCE").await.unwrap();
    let second = fx.client.fetch_quote("RELIANCE").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fx.fake.quote_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ltp_fallback_derives_change_from_previous_quote() {
    // TTL zero: the seeded entry is never fresh, only last-known-good.
    let fx = setup(Duration::ZERO).await;
    fx.cache.put(stale_quote("TCS", 100_00));
    fx.fake.primary_down.store(true, Ordering::SeqCst);

    let quote = fx.client.fetch_quote("TCS").await.unwrap();

    // LTP answered 2455.00 against a previous last of 100.00.
    assert_eq!(quote.last, Decimal::new(2_455_00, 2));
    assert_eq!(quote.change, Decimal::new(2_355_00, 2));
    assert_eq!(quote.volume, 500);
    assert_eq!(quote.high, Decimal::new(2_455_00, 2));
    assert_eq!(fx.fake.ltp_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_cache_serves_when_both_endpoints_fail() {
    let fx = setup(Duration::ZERO).await;
    fx.cache.put(stale_quote("TCS", 350_00));
    fx.fake.primary_down.store(true, Ordering::SeqCst);
    fx.fake.ltp_down.store(true, Ordering::SeqCst);

    let quote = fx.client.fetch_quote("TCS").await.unwrap();
    assert_eq!(quote.last, Decimal::new(350_00, 2));
}

#[tokio::test]
async fn error_propagates_only_with_nothing_cached() {
    let fx = setup(Duration::from_secs(5)).await;
    fx.fake.primary_down.store(true, Ordering::SeqCst);
    fx.fake.ltp_down.store(true, Ordering::SeqCst);

    let err = fx.client.fetch_quote("TCS").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Unavailable { .. }));
}

#[tokio::test]
async fn rate_limit_surfaces_as_rate_limited() {
    let fx = setup(Duration::from_secs(5)).await;
    fx.fake.primary_rate_limited.store(true, Ordering::SeqCst);
    fx.fake.ltp_down.store(true, Ordering::SeqCst);

    // The primary error wins when the fallback also fails.
    let err = fx.client.fetch_quote("TCS").await.unwrap_err();
    assert!(matches!(err, UpstreamError::RateLimited { .. }));
}

#[tokio::test]
async fn unknown_symbol_fails_fast_once_instruments_load() {
    let fx = setup(Duration::from_secs(5)).await;
    fx.instruments
        .load_from_csv(
            "exchange,segment,trading_symbol,name\nNSE,CASH,TCS,Tata Consultancy Services\n",
        )
        .unwrap();

    let err = fx.client.fetch_quote("NOPE").await.unwrap_err();
    assert!(matches!(err, UpstreamError::SymbolNotFound { .. }));
    // No network call for a symbol the directory rules out.
    assert_eq!(fx.fake.quote_calls.load(Ordering::SeqCst), 0);

    // Known symbols still resolve, and pick up the directory name.
    let quote = fx.client.fetch_quote("TCS").await.unwrap();
    assert_eq!(quote.name, "Tata Consultancy Services");
}

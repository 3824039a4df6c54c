//! Groww Upstream Client
//!
//! One network call per symbol against the Groww live-data API, with the
//! relay's graceful-degradation chain:
//!
//! 1. fresh cache entry short-circuits the call entirely;
//! 2. primary quote endpoint (full OHLC + volume);
//! 3. cheaper LTP endpoint, deriving change fields from the previous
//!    cached quote;
//! 4. stale cache entry served as last-known-good;
//! 5. only when none of those exist, the error propagates.
//!
//! Successful fetches populate the shared quote cache before returning.

/// Backoff policy for rate-limit deferral.
pub mod backoff;

/// Provider payload types.
pub mod messages;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::application::ports::{QuoteSource, UpstreamError};
use crate::domain::quote::Quote;
use crate::infrastructure::cache::QuoteCache;
use crate::infrastructure::config::{Credentials, UpstreamSettings};
use crate::infrastructure::instruments::InstrumentTable;
use crate::infrastructure::metrics::{self, FetchOutcome};

use messages::{LtpEnvelope, QuoteEnvelope};

/// HTTP client for the Groww live-data API.
pub struct GrowwClient {
    client: reqwest::Client,
    settings: UpstreamSettings,
    credentials: Credentials,
    cache: Arc<QuoteCache>,
    instruments: Arc<InstrumentTable>,
}

impl GrowwClient {
    /// Create a new client. The request timeout bounds every upstream
    /// call; a timed-out fetch follows the same fallback path as any
    /// other failure.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` builder error when the TLS backend cannot
    /// initialize. There is no untimed fallback client: failing to
    /// apply the timeout fails construction.
    pub fn new(
        settings: UpstreamSettings,
        credentials: Credentials,
        cache: Arc<QuoteCache>,
        instruments: Arc<InstrumentTable>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()?;

        Ok(Self {
            client,
            settings,
            credentials,
            cache,
            instruments,
        })
    }

    /// Primary quote endpoint: full OHLC, change, and volume data.
    async fn fetch_primary(&self, symbol: &str) -> Result<Quote, UpstreamError> {
        let url = format!(
            "{}/v1/live-data/quote?exchange=NSE&segment=CASH&trading_symbol={symbol}",
            self.settings.base_url
        );
        let body = self.get_json(symbol, &url).await?;

        let envelope: QuoteEnvelope =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed {
                symbol: symbol.to_string(),
                cause: e.to_string(),
            })?;

        let payload = match envelope {
            QuoteEnvelope {
                status,
                payload: Some(payload),
            } if status == "SUCCESS" => payload,
            QuoteEnvelope { status, .. } => {
                return Err(UpstreamError::Malformed {
                    symbol: symbol.to_string(),
                    cause: format!("unexpected response status: {status}"),
                });
            }
        };

        let name = self.instruments.name_for(symbol);
        payload
            .into_quote(symbol, &name, Utc::now())
            .map_err(|cause| UpstreamError::Malformed {
                symbol: symbol.to_string(),
                cause,
            })
    }

    /// Cheaper LTP endpoint, attempted when the primary fails. Change and
    /// range fields are derived from the previous cached quote when one
    /// exists.
    async fn fetch_ltp(&self, symbol: &str) -> Result<Quote, UpstreamError> {
        let exchange_symbol = format!("NSE_{symbol}");
        let url = format!(
            "{}/v1/live-data/ltp?segment=CASH&exchange_symbols={exchange_symbol}",
            self.settings.base_url
        );
        let body = self.get_json(symbol, &url).await?;

        let envelope: LtpEnvelope =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed {
                symbol: symbol.to_string(),
                cause: e.to_string(),
            })?;

        let price = envelope
            .payload
            .filter(|_| envelope.status == "SUCCESS")
            .and_then(|payload| payload.get(&exchange_symbol).copied())
            .ok_or_else(|| UpstreamError::Malformed {
                symbol: symbol.to_string(),
                cause: format!("no price for {exchange_symbol}"),
            })?;
        let last = messages::to_decimal(price).map_err(|cause| UpstreamError::Malformed {
            symbol: symbol.to_string(),
            cause,
        })?;

        let previous = self.cache.get(symbol).map(|(quote, _)| quote);
        Ok(Self::quote_from_ltp(symbol, &self.instruments.name_for(symbol), last, previous))
    }

    /// Build a quote from a bare last price plus whatever the previous
    /// cached observation can contribute.
    fn quote_from_ltp(symbol: &str, name: &str, last: Decimal, previous: Option<Quote>) -> Quote {
        let (change, change_percent, volume, high, low, open, previous_close) = match previous {
            Some(prev) => {
                let change = last - prev.last;
                let change_percent = if prev.last.is_zero() {
                    Decimal::ZERO
                } else {
                    change / prev.last * Decimal::ONE_HUNDRED
                };
                (
                    change,
                    change_percent,
                    prev.volume,
                    prev.high.max(last),
                    prev.low.min(last),
                    prev.open,
                    prev.previous_close,
                )
            }
            None => (Decimal::ZERO, Decimal::ZERO, 0, last, last, last, last),
        };

        Quote {
            symbol: symbol.to_string(),
            name: name.to_string(),
            last,
            change,
            change_percent,
            volume,
            high,
            low,
            open,
            previous_close,
            timestamp: Utc::now(),
        }
    }

    /// Issue a GET and map transport-level failures to the error
    /// taxonomy: 429 to `RateLimited`, everything else non-2xx and all
    /// network errors (including timeouts) to `Unavailable`.
    async fn get_json(&self, symbol: &str, url: &str) -> Result<String, UpstreamError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.credentials.api_key())
            .header("Accept", "application/json")
            .header("X-API-VERSION", "1.0")
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable {
                symbol: symbol.to_string(),
                cause: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited {
                symbol: symbol.to_string(),
            });
        }

        if !response.status().is_success() {
            return Err(UpstreamError::Unavailable {
                symbol: symbol.to_string(),
                cause: format!("HTTP {}", response.status()),
            });
        }

        response
            .text()
            .await
            .map_err(|e| UpstreamError::Unavailable {
                symbol: symbol.to_string(),
                cause: e.to_string(),
            })
    }
}

#[async_trait]
impl QuoteSource for GrowwClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, UpstreamError> {
        // Unknown symbols fail fast; the fallback chain cannot help.
        if self.instruments.is_loaded() && !self.instruments.contains(symbol) {
            return Err(UpstreamError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        // Fresh cache entry: no upstream call at all. This is what keeps
        // near-simultaneous requests from different clients cheap.
        if let Some((quote, age)) = self.cache.get(symbol)
            && age < self.settings.cache_ttl
        {
            tracing::debug!(symbol, age_ms = age.as_millis() as u64, "serving cached quote");
            return Ok(quote);
        }

        let started = Instant::now();
        let primary = self.fetch_primary(symbol).await;
        match primary {
            Ok(quote) => {
                metrics::record_fetch(FetchOutcome::Primary);
                metrics::record_fetch_duration(started.elapsed());
                self.cache.put(quote.clone());
                Ok(quote)
            }
            Err(primary_err) => {
                tracing::warn!(symbol, error = %primary_err, "primary fetch failed, trying LTP fallback");
                match self.fetch_ltp(symbol).await {
                    Ok(quote) => {
                        metrics::record_fetch(FetchOutcome::Fallback);
                        metrics::record_fetch_duration(started.elapsed());
                        self.cache.put(quote.clone());
                        Ok(quote)
                    }
                    Err(fallback_err) => {
                        if let Some((stale, age)) = self.cache.get(symbol) {
                            tracing::warn!(
                                symbol,
                                age_ms = age.as_millis() as u64,
                                error = %fallback_err,
                                "both endpoints failed, serving stale cache entry"
                            );
                            metrics::record_fetch(FetchOutcome::Stale);
                            return Ok(stale);
                        }
                        metrics::record_fetch(FetchOutcome::Error);
                        // The primary error is the meaningful one.
                        Err(primary_err)
                    }
                }
            }
        }
    }
}

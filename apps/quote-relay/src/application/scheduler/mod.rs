//! Batch Scheduler
//!
//! Rate-limit-aware batch fetching over a symbol list. Symbols are split
//! into fixed-size chunks; symbols within a chunk fetch concurrently and
//! chunks are separated by a pacing delay, so a run over `n` symbols
//! upstream never sees more than `batch_size` simultaneous calls.
//!
//! Failures are isolated per symbol. A failed symbol is logged and
//! skipped; a chunk whose every symbol fails still advances the run. A
//! rate-limited chunk stretches the pause before the next chunk with
//! exponential backoff, and the first clean chunk resets it.
//!
//! Each chunk's successful quotes go out as one broadcast event, so
//! clients see partial results while a long run is still in flight.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{QuoteSource, UpstreamError};
use crate::domain::quote::Symbol;
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::broadcast::SharedRelayHub;
use crate::infrastructure::metrics;
use crate::infrastructure::upstream::backoff::{BackoffConfig, BackoffPolicy};

/// Scheduler pacing settings.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Maximum symbols fetched concurrently in one chunk.
    pub batch_size: usize,
    /// Pacing delay between consecutive chunks.
    pub batch_delay: Duration,
    /// Backoff applied on top of the pacing delay while rate limited.
    pub backoff: BackoffConfig,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay: Duration::from_millis(500),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Summary of one scheduler run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Chunks processed.
    pub chunks: usize,
    /// Symbols fetched successfully.
    pub succeeded: usize,
    /// Symbols that failed.
    pub failed: usize,
}

/// Paced batch fetcher over the quote source.
pub struct BatchScheduler {
    source: Arc<dyn QuoteSource>,
    hub: SharedRelayHub,
    settings: SchedulerSettings,
}

impl BatchScheduler {
    /// Create a scheduler. A batch size of zero is treated as one.
    #[must_use]
    pub fn new(source: Arc<dyn QuoteSource>, hub: SharedRelayHub, settings: SchedulerSettings) -> Self {
        let settings = SchedulerSettings {
            batch_size: settings.batch_size.max(1),
            ..settings
        };
        Self {
            source,
            hub,
            settings,
        }
    }

    /// Fetch every symbol in paced chunks, broadcasting each chunk's
    /// successes as they complete. An empty symbol list is a no-op.
    pub async fn run(&self, symbols: &[Symbol]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if symbols.is_empty() {
            return outcome;
        }

        let mut backoff = BackoffPolicy::new(self.settings.backoff.clone());
        let chunk_count = symbols.len().div_ceil(self.settings.batch_size);

        for (index, chunk) in symbols.chunks(self.settings.batch_size).enumerate() {
            let results = join_all(
                chunk
                    .iter()
                    .map(|symbol| self.source.fetch_quote(symbol)),
            )
            .await;

            let mut quotes = Vec::with_capacity(chunk.len());
            let mut rate_limited = false;
            for result in results {
                match result {
                    Ok(quote) => quotes.push(quote),
                    Err(err) => {
                        if matches!(err, UpstreamError::RateLimited { .. }) {
                            rate_limited = true;
                        }
                        tracing::warn!(symbol = err.symbol(), error = %err, "batch fetch failed");
                        outcome.failed += 1;
                    }
                }
            }

            outcome.chunks += 1;
            outcome.succeeded += quotes.len();

            if !quotes.is_empty() {
                metrics::record_broadcast(quotes.len() as u64);
                self.hub.send_price_update(quotes);
            }

            // Pace before the next chunk only; the last chunk ends the run.
            if index + 1 < chunk_count {
                let delay = if rate_limited {
                    self.settings.batch_delay + backoff.next_delay()
                } else {
                    backoff.reset();
                    self.settings.batch_delay
                };
                tokio::time::sleep(delay).await;
            }
        }

        tracing::debug!(
            chunks = outcome.chunks,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "batch run complete"
        );
        outcome
    }
}

/// Background refresher over the interest set.
///
/// Ticks at a fixed cadence and runs the scheduler over the union of all
/// live subscriptions. The refresh interval is deliberately longer than
/// the cache TTL so refreshed symbols produce real upstream calls.
pub struct Refresher {
    registry: Arc<SubscriptionRegistry>,
    scheduler: Arc<BatchScheduler>,
    interval: Duration,
    cancel: CancellationToken,
}

impl Refresher {
    /// Create a refresher over the given registry and scheduler.
    #[must_use]
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        scheduler: Arc<BatchScheduler>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            scheduler,
            interval,
            cancel,
        }
    }

    /// Run until cancelled. A tick with an empty interest set is skipped;
    /// a tick that arrives while the previous run is still going is
    /// dropped rather than queued.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; subscriptions already
        // got an on-subscribe run, so skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("refresher shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    let interest = self.registry.interest_set();
                    metrics::set_interest_symbols(interest.len() as f64);
                    if interest.is_empty() {
                        continue;
                    }
                    tracing::debug!(symbols = interest.len(), "periodic refresh");
                    self.scheduler.run(&interest).await;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Broadcast Hub
//!
//! Message distribution using a tokio broadcast channel for efficient
//! fan-out to every connected client session.
//!
//! A completed batch chunk is packaged as one [`RelayEvent`] and delivered
//! to every receiver, not only the session whose subscription triggered
//! the fetch: cache and upstream data are shared, so any client benefits
//! from any fetch. Delivery to a dropped receiver is a no-op and nothing
//! is retried; the next scheduled refresh re-delivers current data.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::quote::Quote;

/// Default capacity for the relay event channel.
const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// An event pushed to all connected clients.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// One or more quotes from a completed batch chunk.
    PriceUpdate(Vec<Quote>),
}

/// Central fan-out hub.
///
/// Each WebSocket session holds one receiver and forwards events to its
/// socket in order, so per-client delivery is FIFO. Slow consumers that
/// lag past the channel capacity lose the oldest events, which the
/// session surfaces in logs rather than treating as fatal.
#[derive(Debug)]
pub struct RelayHub {
    events_tx: broadcast::Sender<RelayEvent>,
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl RelayHub {
    /// Create a hub with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events_tx: broadcast::channel(capacity).0,
        }
    }

    /// Push a price update to all subscribers.
    ///
    /// Returns the number of receivers that got the event, or `None` if
    /// no client is connected (not an error: the data is already cached).
    pub fn send_price_update(&self, quotes: Vec<Quote>) -> Option<usize> {
        self.events_tx.send(RelayEvent::PriceUpdate(quotes)).ok()
    }

    /// Get a new receiver; late subscribers see events going forward only.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events_tx.subscribe()
    }

    /// Number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.events_tx.receiver_count()
    }
}

/// Shared hub reference.
pub type SharedRelayHub = Arc<RelayHub>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn make_quote(symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            last: Decimal::new(150_00, 2),
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            volume: 100,
            high: Decimal::new(151_00, 2),
            low: Decimal::new(149_00, 2),
            open: Decimal::new(150_00, 2),
            previous_close: Decimal::new(150_00, 2),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let hub = RelayHub::default();
        assert_eq!(hub.receiver_count(), 0);

        let rx1 = hub.subscribe();
        let rx2 = hub.subscribe();
        assert_eq!(hub.receiver_count(), 2);

        drop(rx1);
        drop(rx2);
        assert_eq!(hub.receiver_count(), 0);
    }

    #[test]
    fn send_with_no_receivers_returns_none() {
        let hub = RelayHub::default();
        assert!(hub.send_price_update(vec![make_quote("TCS")]).is_none());
    }

    #[tokio::test]
    async fn all_receivers_get_the_same_event() {
        let hub = RelayHub::default();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        let sent = hub.send_price_update(vec![make_quote("TCS"), make_quote("INFY")]);
        assert_eq!(sent, Some(2));

        let RelayEvent::PriceUpdate(quotes1) = rx1.recv().await.unwrap();
        let RelayEvent::PriceUpdate(quotes2) = rx2.recv().await.unwrap();
        assert_eq!(quotes1.len(), 2);
        assert_eq!(quotes1[0].symbol, quotes2[0].symbol);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let hub = RelayHub::default();
        let mut early = hub.subscribe();

        let _ = hub.send_price_update(vec![make_quote("TCS")]);
        let mut late = hub.subscribe();
        let _ = hub.send_price_update(vec![make_quote("INFY")]);

        let RelayEvent::PriceUpdate(first) = early.recv().await.unwrap();
        assert_eq!(first[0].symbol, "TCS");

        // No replay for late subscribers: first event seen is the second.
        let RelayEvent::PriceUpdate(only) = late.recv().await.unwrap();
        assert_eq!(only[0].symbol, "INFY");
    }

    #[tokio::test]
    async fn per_receiver_delivery_is_fifo() {
        let hub = RelayHub::default();
        let mut rx = hub.subscribe();

        for symbol in ["A", "B", "C"] {
            let _ = hub.send_price_update(vec![make_quote(symbol)]);
        }

        for expected in ["A", "B", "C"] {
            let RelayEvent::PriceUpdate(quotes) = rx.recv().await.unwrap();
            assert_eq!(quotes[0].symbol, expected);
        }
    }
}

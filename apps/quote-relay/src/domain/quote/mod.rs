//! Quote Types
//!
//! Point-in-time price/volume snapshots for a single symbol. A `Quote` is
//! only ever replaced wholesale in the cache, never mutated field by field,
//! so readers can never observe a torn update.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A symbol string (NSE trading symbol).
pub type Symbol = String;

/// Immutable snapshot of one symbol at one instant.
///
/// Serialized form matches the relay's wire format: prices as decimal
/// strings, `timestamp` as an RFC 3339 UTC instant. The timestamp reveals
/// the age of a quote to downstream consumers, which is how stale
/// last-known-good data stays distinguishable from live data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Trading symbol, the unique key.
    pub symbol: Symbol,
    /// Company name from the instruments table; falls back to the symbol.
    pub name: String,
    /// Last traded price.
    pub last: Decimal,
    /// Absolute day change.
    pub change: Decimal,
    /// Percent day change.
    pub change_percent: Decimal,
    /// Traded volume.
    pub volume: u64,
    /// Day high.
    pub high: Decimal,
    /// Day low.
    pub low: Decimal,
    /// Day open.
    pub open: Decimal,
    /// Previous session close.
    pub previous_close: Decimal,
    /// When this observation was taken.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Quote {
        Quote {
            symbol: "RELIANCE".to_string(),
            name: "Reliance Industries".to_string(),
            last: Decimal::new(2_450_75, 2),
            change: Decimal::new(12_50, 2),
            change_percent: Decimal::new(51, 2),
            volume: 1_250_000,
            high: Decimal::new(2_460_00, 2),
            low: Decimal::new(2_431_10, 2),
            open: Decimal::new(2_438_25, 2),
            previous_close: Decimal::new(2_438_25, 2),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn serializes_prices_as_strings() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["symbol"], "RELIANCE");
        assert_eq!(json["last"], "2450.75");
        assert_eq!(json["volume"], 1_250_000);
    }

    #[test]
    fn round_trips_through_json() {
        let quote = sample();
        let json = serde_json::to_string(&quote).unwrap();
        let back: Quote = serde_json::from_str(&json).unwrap();
        assert_eq!(back, quote);
    }
}

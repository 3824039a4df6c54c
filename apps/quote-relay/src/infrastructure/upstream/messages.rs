//! Groww API Payload Types
//!
//! Deserialization types for the live-data quote and LTP endpoints.
//! Numeric fields arrive as JSON numbers and are converted to `Decimal`
//! at the boundary; any field the API is known to omit is optional, with
//! the same fallback chain the relay has always applied.
//!
//! The `ohlc` field is special: the API sometimes returns it as an object
//! and sometimes as a brace-delimited string (`"{open: 149.5,high: ...}"`).
//! Both forms are accepted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::quote::Quote;

/// Envelope wrapping every Groww live-data response.
#[derive(Debug, Deserialize)]
pub struct QuoteEnvelope {
    /// "SUCCESS" on a good response.
    pub status: String,
    /// The quote payload; absent on error responses.
    #[serde(default)]
    pub payload: Option<QuotePayload>,
}

/// Quote endpoint payload.
#[derive(Debug, Default, Deserialize)]
pub struct QuotePayload {
    /// Last traded price.
    #[serde(default)]
    pub last_price: Option<f64>,
    /// Alternate name for the last traded price on some instruments.
    #[serde(default)]
    pub last_trade_price: Option<f64>,
    /// Absolute day change.
    #[serde(default)]
    pub day_change: Option<f64>,
    /// Percent day change.
    #[serde(default)]
    pub day_change_perc: Option<f64>,
    /// Traded volume.
    #[serde(default)]
    pub volume: Option<u64>,
    /// Outstanding buy quantity, used as a volume fallback.
    #[serde(default)]
    pub total_buy_quantity: Option<u64>,
    /// Outstanding sell quantity, used as a volume fallback.
    #[serde(default)]
    pub total_sell_quantity: Option<u64>,
    /// Day high.
    #[serde(default)]
    pub high_trade_range: Option<f64>,
    /// Day low.
    #[serde(default)]
    pub low_trade_range: Option<f64>,
    /// OHLC block, object or brace-delimited string.
    #[serde(default)]
    pub ohlc: Option<serde_json::Value>,
    /// 52-week high, last-resort bound for the day high.
    #[serde(default)]
    pub week_52_high: Option<f64>,
    /// 52-week low, last-resort bound for the day low.
    #[serde(default)]
    pub week_52_low: Option<f64>,
}

/// Envelope for the LTP (last traded price) fallback endpoint. The
/// payload maps `NSE_<symbol>` keys to bare prices.
#[derive(Debug, Deserialize)]
pub struct LtpEnvelope {
    /// "SUCCESS" on a good response.
    pub status: String,
    /// Exchange-symbol to price map; absent on error responses.
    #[serde(default)]
    pub payload: Option<HashMap<String, f64>>,
}

/// Parsed OHLC block.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ohlc {
    /// Day open.
    pub open: Option<f64>,
    /// Day high.
    pub high: Option<f64>,
    /// Day low.
    pub low: Option<f64>,
    /// Previous close.
    pub close: Option<f64>,
}

impl Ohlc {
    /// Parse from either JSON form the API emits.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self {
                open: map.get("open").and_then(serde_json::Value::as_f64),
                high: map.get("high").and_then(serde_json::Value::as_f64),
                low: map.get("low").and_then(serde_json::Value::as_f64),
                close: map.get("close").and_then(serde_json::Value::as_f64),
            },
            serde_json::Value::String(text) => Self::from_braced_string(text),
            _ => Self::default(),
        }
    }

    /// Parse the string form: `{open: 149.50,high: 150.50,low: ...}`.
    fn from_braced_string(text: &str) -> Self {
        let mut ohlc = Self::default();
        let inner = text.trim_matches(|c| c == '{' || c == '}');
        for part in inner.split(',') {
            let Some((key, value)) = part.split_once(':') else {
                continue;
            };
            let Ok(value) = value.trim().parse::<f64>() else {
                continue;
            };
            match key.trim() {
                "open" => ohlc.open = Some(value),
                "high" => ohlc.high = Some(value),
                "low" => ohlc.low = Some(value),
                "close" => ohlc.close = Some(value),
                _ => {}
            }
        }
        ohlc
    }
}

/// Convert a float at the provider boundary into a `Decimal`.
///
/// # Errors
///
/// Returns the offending value as a string when it is not representable
/// (NaN, infinity).
pub fn to_decimal(value: f64) -> Result<Decimal, String> {
    Decimal::try_from(value).map_err(|_| format!("unrepresentable number: {value}"))
}

impl QuotePayload {
    /// Build a [`Quote`] from the payload, applying the documented
    /// fallback chain for fields the API omits.
    ///
    /// # Errors
    ///
    /// Returns a description of the schema mismatch when no last price is
    /// present or a numeric field is unrepresentable.
    pub fn into_quote(
        self,
        symbol: &str,
        name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Quote, String> {
        let last = self
            .last_price
            .or(self.last_trade_price)
            .ok_or_else(|| "missing last price".to_string())?;
        let last = to_decimal(last)?;

        let change = to_decimal(self.day_change.unwrap_or(0.0))?;
        let change_percent = to_decimal(self.day_change_perc.unwrap_or(0.0))?;

        let ohlc = self.ohlc.as_ref().map(Ohlc::from_value).unwrap_or_default();

        let high = match self.high_trade_range.or(ohlc.high).or(self.week_52_high) {
            Some(v) => to_decimal(v)?,
            None => last,
        };
        let low = match self.low_trade_range.or(ohlc.low).or(self.week_52_low) {
            Some(v) => to_decimal(v)?,
            None => last,
        };
        let open = match ohlc.open {
            Some(v) => to_decimal(v)?,
            None => last,
        };
        let previous_close = match ohlc.close {
            Some(v) => to_decimal(v)?,
            None => last - change,
        };

        let volume = self.volume.unwrap_or_else(|| {
            self.total_buy_quantity.unwrap_or(0) + self.total_sell_quantity.unwrap_or(0)
        });

        Ok(Quote {
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
            timestamp,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_envelope() {
        let body = r#"{
            "status": "SUCCESS",
            "payload": {
                "last_price": 2450.75,
                "day_change": 12.5,
                "day_change_perc": 0.51,
                "volume": 1250000,
                "ohlc": {"open": 2438.25, "high": 2460.0, "low": 2431.1, "close": 2438.25}
            }
        }"#;

        let envelope: QuoteEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.status, "SUCCESS");

        let quote = envelope
            .payload
            .unwrap()
            .into_quote("RELIANCE", "Reliance Industries", Utc::now())
            .unwrap();
        assert_eq!(quote.last, Decimal::new(2_450_75, 2));
        assert_eq!(quote.open, Decimal::new(2_438_25, 2));
        assert_eq!(quote.volume, 1_250_000);
    }

    #[test]
    fn ohlc_string_form_is_accepted() {
        let value = serde_json::Value::String(
            "{open: 149.50,high: 150.50,low: 148.50,close: 149.50}".to_string(),
        );
        let ohlc = Ohlc::from_value(&value);
        assert_eq!(ohlc.open, Some(149.50));
        assert_eq!(ohlc.high, Some(150.50));
        assert_eq!(ohlc.low, Some(148.50));
        assert_eq!(ohlc.close, Some(149.50));
    }

    #[test]
    fn ohlc_garbage_string_yields_defaults() {
        let value = serde_json::Value::String("not ohlc".to_string());
        let ohlc = Ohlc::from_value(&value);
        assert!(ohlc.open.is_none());
        assert!(ohlc.high.is_none());
    }

    #[test]
    fn missing_last_price_is_a_schema_error() {
        let payload = QuotePayload::default();
        let err = payload.into_quote("TCS", "TCS", Utc::now()).unwrap_err();
        assert!(err.contains("missing last price"));
    }

    #[test]
    fn last_trade_price_is_accepted_as_alternate() {
        let payload = QuotePayload {
            last_trade_price: Some(99.5),
            ..Default::default()
        };
        let quote = payload.into_quote("TCS", "TCS", Utc::now()).unwrap();
        assert_eq!(quote.last, Decimal::new(99_50, 2));
        // With no OHLC, bounds collapse onto the last price.
        assert_eq!(quote.high, quote.last);
        assert_eq!(quote.low, quote.last);
    }

    #[test]
    fn volume_falls_back_to_order_book_quantities() {
        let payload = QuotePayload {
            last_price: Some(10.0),
            total_buy_quantity: Some(300),
            total_sell_quantity: Some(200),
            ..Default::default()
        };
        let quote = payload.into_quote("TCS", "TCS", Utc::now()).unwrap();
        assert_eq!(quote.volume, 500);
    }

    #[test]
    fn previous_close_derives_from_change_when_ohlc_absent() {
        let payload = QuotePayload {
            last_price: Some(110.0),
            day_change: Some(10.0),
            ..Default::default()
        };
        let quote = payload.into_quote("TCS", "TCS", Utc::now()).unwrap();
        assert_eq!(quote.previous_close, Decimal::new(100_00, 2));
    }

    #[test]
    fn ltp_envelope_maps_exchange_symbols() {
        let body = r#"{"status": "SUCCESS", "payload": {"NSE_RELIANCE": 2450.75}}"#;
        let envelope: LtpEnvelope = serde_json::from_str(body).unwrap();
        let payload = envelope.payload.unwrap();
        assert_eq!(payload.get("NSE_RELIANCE"), Some(&2450.75));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(to_decimal(f64::NAN).is_err());
        assert!(to_decimal(f64::INFINITY).is_err());
        assert!(to_decimal(2450.75).is_ok());
    }
}

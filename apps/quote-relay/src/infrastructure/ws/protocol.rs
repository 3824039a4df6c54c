//! WebSocket Wire Protocol
//!
//! JSON frames exchanged with browser clients. Every frame is an object
//! with an `event` discriminator and a `data` payload, e.g.
//! `{"event":"priceUpdate","data":[...]}`.

use serde::{Deserialize, Serialize};

use crate::domain::quote::Quote;

/// Frames sent by the relay to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerFrame {
    /// A batch of fresh quotes.
    PriceUpdate(Vec<Quote>),
    /// A per-symbol failure, delivered only to the session whose request
    /// caused it.
    StockError {
        /// Symbol the failure is about.
        symbol: String,
        /// Human-readable description.
        error: String,
    },
}

/// Frames sent by clients to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Replace the session's subscription list wholesale.
    SubscribeStocks(Vec<String>),
    /// One-off fetch of a single symbol.
    RequestStock(String),
}

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
            last: Decimal::new(2_450_75, 2),
            change: Decimal::new(12_50, 2),
            change_percent: Decimal::new(51, 2),
            volume: 1_000,
            high: Decimal::new(2_460_00, 2),
            low: Decimal::new(2_431_10, 2),
            open: Decimal::new(2_438_25, 2),
            previous_close: Decimal::new(2_438_25, 2),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn price_update_uses_event_data_shape() {
        let frame = ServerFrame::PriceUpdate(vec![make_quote("RELIANCE")]);
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "priceUpdate");
        assert!(json["data"].is_array());
        assert_eq!(json["data"][0]["symbol"], "RELIANCE");
    }

    #[test]
    fn stock_error_names_symbol_and_error() {
        let frame = ServerFrame::StockError {
            symbol: "NOPE".to_string(),
            error: "symbol not found: NOPE".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "stockError");
        assert_eq!(json["data"]["symbol"], "NOPE");
    }

    #[test]
    fn subscribe_stocks_frame_parses() {
        let text = r#"{"event":"subscribeStocks","data":["TCS","INFY"]}"#;
        let frame: ClientFrame = serde_json::from_str(text).unwrap();
        let ClientFrame::SubscribeStocks(symbols) = frame else {
            panic!("expected subscribeStocks");
        };
        assert_eq!(symbols, ["TCS", "INFY"]);
    }

    #[test]
    fn request_stock_frame_parses() {
        let text = r#"{"event":"requestStock","data":"RELIANCE"}"#;
        let frame: ClientFrame = serde_json::from_str(text).unwrap();
        assert!(matches!(frame, ClientFrame::RequestStock(s) if s == "RELIANCE"));
    }

    #[test]
    fn unknown_event_is_rejected() {
        let text = r#"{"event":"selfDestruct","data":null}"#;
        assert!(serde_json::from_str::<ClientFrame>(text).is_err());
    }
}

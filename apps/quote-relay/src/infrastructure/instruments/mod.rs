//! Instrument Directory
//!
//! Symbol-to-company-name directory built from the provider's published
//! instrument CSV, filtered to NSE cash-segment equities. The table
//! doubles as the symbol validator: once it has loaded, a symbol absent
//! from it is rejected before any upstream call.
//!
//! Loading is best effort. When the download fails at startup the relay
//! still serves quotes; symbol validation is simply skipped and names
//! fall back to the symbol itself.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Published instrument directory for the Groww API.
pub const INSTRUMENTS_CSV_URL: &str =
    "https://growwapi-assets.groww.in/instruments/instrument.csv";

/// Instrument directory error.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    /// The CSV could not be downloaded.
    #[error("instrument download failed: {0}")]
    Download(String),
    /// The CSV could not be parsed.
    #[error("instrument CSV parse failed: {0}")]
    Parse(String),
    /// The CSV parsed but produced no usable rows.
    #[error("instrument CSV contained no NSE cash-segment rows")]
    Empty,
}

/// Thread-safe symbol-to-name directory.
#[derive(Debug, Default)]
pub struct InstrumentTable {
    names: RwLock<HashMap<String, String>>,
}

impl InstrumentTable {
    /// Create an empty, unloaded table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the table has been populated. Symbol validation only
    /// applies once this is true.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !self.names.read().is_empty()
    }

    /// Whether a trading symbol exists in the directory.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.names.read().contains_key(symbol)
    }

    /// Company name for a symbol, falling back to the symbol itself.
    #[must_use]
    pub fn name_for(&self, symbol: &str) -> String {
        self.names
            .read()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| symbol.to_string())
    }

    /// Number of known instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    /// Parse CSV text and replace the directory contents.
    ///
    /// Rows are kept when exchange is NSE, segment is CASH, and both the
    /// trading symbol and name are non-empty (the published file contains
    /// literal "NaN" names, which are rejected).
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::Parse`] on CSV structure errors and
    /// [`InstrumentError::Empty`] when no row survives the filter.
    pub fn load_from_csv(&self, text: &str) -> Result<usize, InstrumentError> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| InstrumentError::Parse(e.to_string()))?;
        let col = |name: &str| headers.iter().position(|h| h == name);
        let (Some(symbol_idx), Some(name_idx), Some(exchange_idx), Some(segment_idx)) = (
            col("trading_symbol"),
            col("name"),
            col("exchange"),
            col("segment"),
        ) else {
            return Err(InstrumentError::Parse(
                "missing expected column headers".to_string(),
            ));
        };

        let mut names = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| InstrumentError::Parse(e.to_string()))?;
            let field = |idx: usize| record.get(idx).unwrap_or("").trim();

            if field(exchange_idx) != "NSE" || field(segment_idx) != "CASH" {
                continue;
            }
            let symbol = field(symbol_idx);
            let name = field(name_idx);
            if symbol.is_empty() || name.is_empty() || name == "NaN" {
                continue;
            }
            names.insert(symbol.to_string(), name.to_string());
        }

        if names.is_empty() {
            return Err(InstrumentError::Empty);
        }

        let count = names.len();
        *self.names.write() = names;
        Ok(count)
    }

    /// Download the published CSV and replace the directory contents.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::Download`] on transport failures and
    /// the [`Self::load_from_csv`] errors on bad content.
    pub async fn reload(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<usize, InstrumentError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| InstrumentError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(InstrumentError::Download(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| InstrumentError::Download(e.to_string()))?;

        let count = self.load_from_csv(&text)?;
        tracing::info!(count, "instrument directory loaded");
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================

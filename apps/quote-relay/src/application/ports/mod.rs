//! Port Definitions
//!
//! The seam between the batch scheduler and the upstream quote provider.
//! The scheduler only ever talks to [`QuoteSource`]; production wires in
//! the Groww HTTP client, tests wire in a mock.

use async_trait::async_trait;

use crate::domain::quote::{Quote, Symbol};

/// Errors from a single upstream fetch, keyed by the symbol that failed.
///
/// Per-symbol errors are always isolated: a failing symbol never aborts
/// its batch or the scheduler run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// Network failure, timeout, or 5xx from the provider.
    #[error("upstream unavailable for {symbol}: {cause}")]
    Unavailable {
        /// Symbol the fetch was for.
        symbol: Symbol,
        /// Underlying cause, stringified for transport across the port.
        cause: String,
    },

    /// Provider returned 429 or the local rate limiter refused the call.
    /// Recovered by deferring to a later chunk, never fatal.
    #[error("upstream rate limited fetching {symbol}")]
    RateLimited {
        /// Symbol the fetch was for.
        symbol: Symbol,
    },

    /// Provider response did not match the expected schema. Handled
    /// identically to [`UpstreamError::Unavailable`] by callers.
    #[error("malformed upstream response for {symbol}: {cause}")]
    Malformed {
        /// Symbol the fetch was for.
        symbol: Symbol,
        /// What failed to parse.
        cause: String,
    },

    /// Symbol absent from the instruments reference table. Surfaced
    /// directly to the requesting client; no fallback chain is attempted.
    #[error("symbol not found: {symbol}")]
    SymbolNotFound {
        /// The unknown symbol.
        symbol: Symbol,
    },
}

impl UpstreamError {
    /// The symbol this error is about.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Unavailable { symbol, .. }
            | Self::RateLimited { symbol }
            | Self::Malformed { symbol, .. }
            | Self::SymbolNotFound { symbol } => symbol,
        }
    }
}

/// A source of quotes, one network call per symbol.
///
/// Implementations consult and populate the shared quote cache, attempt a
/// cheaper fallback endpoint on primary failure, and degrade to a stale
/// cache entry before propagating an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the latest quote for one symbol.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] only when primary, fallback, and stale
    /// cache are all unavailable, or the symbol is unknown.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, UpstreamError>;
}

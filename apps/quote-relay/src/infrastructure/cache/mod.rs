//! Quote Cache
//!
//! Time-bounded mapping from symbol to last-known quote; the single source
//! of truth for "fresh enough" data. The cache exists to prevent duplicate
//! upstream calls for near-simultaneous requests, not long-term storage:
//! the TTL is a few seconds while the re-fetch cadence is tens of seconds.
//!
//! Entries are never evicted. Stale entries are retained deliberately so
//! they can be served as last-known-good when the upstream fails. Memory
//! therefore grows with the number of distinct symbols ever seen, which is
//! bounded by the universe of tradable symbols rather than request volume.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::domain::quote::{Quote, Symbol};

#[derive(Debug, Clone)]
struct CacheEntry {
    quote: Quote,
    inserted_at: Instant,
}

/// Shared quote cache.
///
/// `get` never blocks on I/O and never fails; staleness is the caller's
/// policy, decided from the returned age. Writes for a given symbol only
/// ever happen from that symbol's own fetch, so there is no per-key
/// write-write race.
#[derive(Debug, Default)]
pub struct QuoteCache {
    entries: RwLock<HashMap<Symbol, CacheEntry>>,
}

impl QuoteCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached quote and its age, regardless of staleness.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<(Quote, Duration)> {
        let entries = self.entries.read();
        entries
            .get(symbol)
            .map(|entry| (entry.quote.clone(), entry.inserted_at.elapsed()))
    }

    /// Unconditional overwrite with a fresh insertion timestamp.
    pub fn put(&self, quote: Quote) {
        let mut entries = self.entries.write();
        entries.insert(
            quote.symbol.clone(),
            CacheEntry {
                quote,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Whether a fresh entry exists: present and younger than `ttl`.
    #[must_use]
    pub fn is_fresh(&self, symbol: &str, ttl: Duration) -> bool {
        let entries = self.entries.read();
        entries
            .get(symbol)
            .is_some_and(|entry| entry.inserted_at.elapsed() < ttl)
    }

    /// Number of distinct symbols ever cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

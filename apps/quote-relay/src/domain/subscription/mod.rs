//! Subscription Registry
//!
//! Tracks, per connected client, which symbols it wants live updates for.
//!
//! # Design
//!
//! - A subscribe call **replaces** the client's symbol list wholesale.
//!   The latest call defines the client's full interest set; adding one
//!   symbol means resending the whole watchlist. This matches the upstream
//!   product behavior and keeps re-subscription trivial.
//! - Duplicates are coalesced and insertion order is preserved, so the
//!   batch scheduler walks symbols in the order clients asked for them.
//! - The registry remembers the last symbol list per logical client id
//!   across transport drops. A reconnecting session replays it through
//!   [`SubscriptionRegistry::resubscribe`]; only live connections count
//!   toward the interest set.
//! - Replay state is kept only for ids the client chose itself. A
//!   server-generated id can never come back, so its session ends with
//!   [`SubscriptionRegistry::forget`] and leaves nothing behind.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::domain::quote::Symbol;

/// Logical identifier for a client connection. Survives transport drops
/// when the client reconnects with the same id.
pub type ClientId = String;

// =============================================================================
// Connection Lifecycle
// =============================================================================

/// Per-connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport attached.
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Transport attached; `subscribed` is true once a symbol list has
    /// been registered for this connection.
    Connected {
        /// Whether a subscription has been registered.
        subscribed: bool,
    },
}

/// Events that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Transport handshake started.
    Opening,
    /// Transport established.
    Opened,
    /// A subscription was registered for this connection.
    Subscribed,
    /// Transport dropped.
    Closed,
}

impl ConnectionState {
    /// Apply an event, returning the next state.
    ///
    /// The single transition function for the connect/reconnect flow:
    /// on `Opened` after a drop, the session replays its last known
    /// subscription and then observes `Subscribed`.
    #[must_use]
    pub const fn apply(self, event: ConnectionEvent) -> Self {
        match (self, event) {
            (Self::Disconnected, ConnectionEvent::Opening) => Self::Connecting,
            (Self::Connecting | Self::Disconnected, ConnectionEvent::Opened) => {
                Self::Connected { subscribed: false }
            }
            (Self::Connected { .. }, ConnectionEvent::Subscribed) => {
                Self::Connected { subscribed: true }
            }
            (_, ConnectionEvent::Closed) => Self::Disconnected,
            (state, _) => state,
        }
    }
}

// =============================================================================
// Registry State
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    /// Live connections in join order, each with its current symbol list.
    live: Vec<(ClientId, Vec<Symbol>)>,
    /// Last known symbol list per logical client id. Survives disconnects
    /// so a reconnecting client can replay its watchlist.
    last_known: HashMap<ClientId, Vec<Symbol>>,
}

impl RegistryState {
    fn entry_mut(&mut self, client: &str) -> Option<&mut Vec<Symbol>> {
        self.live
            .iter_mut()
            .find(|(id, _)| id == client)
            .map(|(_, symbols)| symbols)
    }
}

/// Coalesce duplicates while preserving first-seen order.
fn dedup_preserving_order(symbols: Vec<Symbol>) -> Vec<Symbol> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe registry of per-connection symbol interest.
///
/// The only shared mutable state besides the quote cache; all mutations
/// take the write lock so readers always observe a fully replaced list,
/// never a partial update.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection with no subscription yet.
    ///
    /// Idempotent: reconnecting with an id that is already live keeps the
    /// existing record.
    pub fn connect(&self, client: &str) {
        let mut state = self.state.write();
        if state.entry_mut(client).is_none() {
            state.live.push((client.to_string(), Vec::new()));
        }
    }

    /// Replace the client's symbol list wholesale.
    ///
    /// Duplicates are coalesced, insertion order preserved. Returns the
    /// normalized list actually recorded.
    pub fn subscribe(&self, client: &str, symbols: Vec<Symbol>) -> Vec<Symbol> {
        let deduped = dedup_preserving_order(symbols);
        let mut state = self.state.write();
        if let Some(entry) = state.entry_mut(client) {
            entry.clone_from(&deduped);
        } else {
            state.live.push((client.to_string(), deduped.clone()));
        }
        state.last_known.insert(client.to_string(), deduped.clone());
        deduped
    }

    /// Remove a connection's record; invoked on disconnect.
    ///
    /// The last known symbol list is retained so the client can replay it
    /// on reconnect. Sessions whose id cannot recur use [`Self::forget`]
    /// instead.
    pub fn disconnect(&self, client: &str) {
        let mut state = self.state.write();
        state.live.retain(|(id, _)| id != client);
    }

    /// Remove a connection's record and its replay state.
    ///
    /// Used when the id was generated server-side for an anonymous
    /// session: no future connection can present it, so keeping the
    /// symbol list would grow the map once per connection forever.
    pub fn forget(&self, client: &str) {
        let mut state = self.state.write();
        state.live.retain(|(id, _)| id != client);
        state.last_known.remove(client);
    }

    /// Last recorded symbol list for a logical client id, if any.
    ///
    /// A reconnecting session feeds this back into [`Self::subscribe`].
    #[must_use]
    pub fn resubscribe(&self, client: &str) -> Option<Vec<Symbol>> {
        let state = self.state.read();
        state
            .last_known
            .get(client)
            .filter(|symbols| !symbols.is_empty())
            .cloned()
    }

    /// Union of all live connections' symbols, first-seen order.
    ///
    /// Reflects the post-replace/post-remove state immediately, so the
    /// periodic refresher never skips a newly subscribed symbol.
    #[must_use]
    pub fn interest_set(&self) -> Vec<Symbol> {
        let state = self.state.read();
        let mut seen = HashSet::new();
        let mut interest = Vec::new();
        for (_, symbols) in &state.live {
            for symbol in symbols {
                if seen.insert(symbol.clone()) {
                    interest.push(symbol.clone());
                }
            }
        }
        interest
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.read().live.len()
    }

    /// Number of logical client ids with retained replay state.
    #[must_use]
    pub fn replay_count(&self) -> usize {
        self.state.read().last_known.len()
    }

    /// Symbols currently recorded for a live connection.
    #[must_use]
    pub fn client_symbols(&self, client: &str) -> Vec<Symbol> {
        let state = self.state.read();
        state
            .live
            .iter()
            .find(|(id, _)| id == client)
            .map(|(_, symbols)| symbols.clone())
            .unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! WebSocket Sessions
//!
//! One task per connected client. A session registers its connection,
//! replays the client's last subscription when it reconnects with the
//! same `client_id`, forwards broadcast events to its socket, and handles
//! inbound subscribe and one-off-fetch frames.
//!
//! Price updates go to every session regardless of which subscription
//! triggered the fetch; only `stockError` frames are private to the
//! session whose request failed.

/// Wire frame types.
pub mod protocol;

use std::sync::Arc;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::domain::subscription::{ConnectionEvent, ConnectionState};
use crate::infrastructure::broadcast::RelayEvent;
use crate::infrastructure::http::RelayState;
use crate::infrastructure::metrics;

use protocol::{ClientFrame, ServerFrame};

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Logical client id; reusing one across connections enables
    /// subscription replay. Absent ids get a fresh UUID.
    pub client_id: Option<String>,
}

/// Upgrade handler mounted at `GET /ws`.
pub async fn websocket_handler(
    State(state): State<Arc<RelayState>>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    // Only a client-chosen id can recur, so only those keep replay
    // state past the session.
    let supplied = params.client_id.filter(|id| !id.is_empty());
    let replayable = supplied.is_some();
    let client_id = supplied.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_session(socket, state, client_id, replayable))
}

async fn handle_session(
    socket: WebSocket,
    state: Arc<RelayState>,
    client_id: String,
    replayable: bool,
) {
    let mut conn = ConnectionState::Disconnected
        .apply(ConnectionEvent::Opening)
        .apply(ConnectionEvent::Opened);

    state.registry.connect(&client_id);
    metrics::set_connected_clients(state.registry.connection_count() as f64);
    tracing::info!(client_id, "client connected");

    let (mut sink, mut inbound) = socket.split();
    let mut events = state.hub.subscribe();

    // Reconnect with a known id: replay the last subscription and kick
    // off a fetch so the client has data without resending its list.
    if let Some(symbols) = state.registry.resubscribe(&client_id) {
        tracing::info!(client_id, symbols = symbols.len(), "replaying subscription");
        let recorded = state.registry.subscribe(&client_id, symbols);
        conn = conn.apply(ConnectionEvent::Subscribed);
        spawn_batch_run(&state, recorded);
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(RelayEvent::PriceUpdate(quotes)) => {
                        let frame = ServerFrame::PriceUpdate(quotes);
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(client_id, skipped, "session lagged behind broadcasts");
                        metrics::record_events_lagged(skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            message = inbound.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                conn = handle_frame(&state, &client_id, conn, frame, &mut sink).await;
                            }
                            Err(err) => {
                                tracing::debug!(client_id, error = %err, "ignoring unparseable frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            () = state.cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    let _ = conn.apply(ConnectionEvent::Closed);
    if replayable {
        state.registry.disconnect(&client_id);
    } else {
        state.registry.forget(&client_id);
    }
    metrics::set_connected_clients(state.registry.connection_count() as f64);
    metrics::set_interest_symbols(state.registry.interest_set().len() as f64);
    tracing::info!(client_id, "client disconnected");
}

async fn handle_frame(
    state: &Arc<RelayState>,
    client_id: &str,
    conn: ConnectionState,
    frame: ClientFrame,
    sink: &mut SplitSink<WebSocket, Message>,
) -> ConnectionState {
    match frame {
        ClientFrame::SubscribeStocks(symbols) => {
            let recorded = state.registry.subscribe(client_id, symbols);
            metrics::set_interest_symbols(state.registry.interest_set().len() as f64);
            tracing::info!(client_id, symbols = recorded.len(), "subscription replaced");
            spawn_batch_run(state, recorded);
            conn.apply(ConnectionEvent::Subscribed)
        }
        ClientFrame::RequestStock(symbol) => {
            let symbol = symbol.trim().to_string();
            if symbol.is_empty() {
                return conn;
            }
            match state.source.fetch_quote(&symbol).await {
                // Broadcast, not a private reply: the quote is now cached
                // and every client's view of the symbol should agree.
                Ok(quote) => {
                    state.hub.send_price_update(vec![quote]);
                }
                Err(err) => {
                    tracing::warn!(client_id, symbol, error = %err, "one-off fetch failed");
                    let frame = ServerFrame::StockError {
                        symbol,
                        error: err.to_string(),
                    };
                    let _ = send_frame(sink, &frame).await;
                }
            }
            conn
        }
    }
}

/// Run the scheduler over freshly subscribed symbols without blocking the
/// session loop.
fn spawn_batch_run(state: &Arc<RelayState>, symbols: Vec<String>) {
    if symbols.is_empty() {
        return;
    }
    let scheduler = Arc::clone(&state.scheduler);
    tokio::spawn(async move {
        scheduler.run(&symbols).await;
    });
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sink.send(Message::Text(payload.into())).await
}

//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use locus_core::{ClientMessage, SessionId};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{
    INVALID_PAYLOADS_TOTAL, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::registry::Frame;
use crate::relay::Relay;
use crate::state::AppState;

/// `GET /ws` — upgrade to a WebSocket session.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Run one client session.
///
/// 1. Registers with the relay's registry, which assigns the session id
/// 2. Forwards queued outbound frames to the socket from a write task
/// 3. Dispatches inbound `send-location` frames into the relay
/// 4. On close (either side), removes the session and notifies peers
async fn run_session(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let buffer = state.settings.ws_send_buffer.max(1);
    let (send_tx, mut send_rx) = mpsc::channel::<Frame>(buffer);
    let relay = Arc::clone(&state.relay);
    let id = relay.registry().register(send_tx).await;

    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(session_id = %id, "client connected");

    // Outbound forwarder. Ends when the socket breaks or the registry
    // entry (the only sender) is dropped.
    let mut outbound = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound loop. Runs to socket close; a dead outbound half also ends
    // the session, since nothing can reach this client anymore.
    loop {
        tokio::select! {
            _ = &mut outbound => break,
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&relay, &id, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(session_id = %id, "channel closed");
                    break;
                }
                // Binary frames are not part of the protocol; ping/pong is
                // answered by the transport layer.
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!(session_id = %id, %error, "read error, closing session");
                    break;
                }
            },
        }
    }

    relay.on_disconnect(&id).await;
    outbound.abort();
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    info!(session_id = %id, "client disconnected");
}

/// Decode one inbound text frame and hand it to the relay.
///
/// Malformed frames are counted and dropped; nothing a client sends can
/// end the session or reach a peer unvalidated.
#[instrument(skip_all, fields(session_id = %id))]
async fn dispatch(relay: &Relay, id: &SessionId, text: &str) {
    match ClientMessage::parse(text) {
        Ok(ClientMessage::SendLocation {
            latitude,
            longitude,
            user_id,
        }) => {
            relay
                .on_location_update(id, latitude, longitude, user_id)
                .await;
        }
        Err(error) => {
            counter!(INVALID_PAYLOADS_TOTAL).increment(1);
            warn!(%error, "ignoring malformed frame");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Per-session WebSocket ingress (§6): an initial `history` replay followed
//! by a live stream of `EnrichedSnapshot`s, with a small set of client
//! control messages accepted inline on the same socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State as AxumState};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::{ClientMessage, HistoryMessage};

use super::control::coerce_speed;
use super::state::AppState;

const CLIENT_CHANNEL_CAPACITY: usize = 256;

pub async fn session_ws(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, session_id: String) {
    let handle = match state.sessions.get_session(&session_id) {
        Some(handle) => handle,
        None => state.sessions.create_session(session_id.clone()),
    };

    let history = HistoryMessage::new(session_id.clone(), handle.history());
    let Ok(msg) = serde_json::to_string(&history) else {
        warn!(session = %session_id, "failed to serialize history message");
        return;
    };
    if socket.send(Message::Text(msg)).await.is_err() {
        return;
    }

    let (client_tx, mut client_rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
    handle.set_client_sender(client_tx);

    loop {
        tokio::select! {
            Some(enriched) = client_rx.recv() => {
                let msg = match serde_json::to_string(&enriched) {
                    Ok(msg) => msg,
                    Err(_) => continue,
                };
                if socket.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_message(&handle, &text).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    handle.clear_client_sender();
    info!(session = %session_id, "websocket closed");
}

/// Returns `false` if the socket should be closed (not currently possible,
/// but keeps the loop symmetric with the frame-error cases above).
async fn handle_client_message(handle: &crate::session::SessionHandle, text: &str) -> bool {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        return true;
    };
    match msg {
        ClientMessage::SetSpeed { speed, .. } => {
            let clamped = coerce_speed(speed.as_ref());
            let _ = handle.set_speed(clamped);
        }
        ClientMessage::Ping { .. } | ClientMessage::Pong { .. } => {}
        ClientMessage::Subscribe { .. } | ClientMessage::Unsubscribe { .. } => {}
    }
    true
}

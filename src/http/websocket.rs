//! Broadcast channel over WebSocket.
//!
//! # Responsibilities
//! - Upgrade `/api/ws` requests
//! - Forward every Store broadcast to the subscriber as a JSON text frame
//! - Resend a full snapshot when a slow subscriber lagged behind
//!
//! # Data Flow
//! ```text
//! ConfigStore ──broadcast::Sender──▶ session ──text frame──▶ client
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::http::server::AppState;
use crate::model::StoreMessage;
use crate::observability::metrics;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the handshake completes so that no broadcast sent
    // after the client sees the upgrade is missed.
    let updates = state.store.subscribe();
    ws.on_upgrade(move |socket| session(socket, state, updates))
}

async fn session(mut socket: WebSocket, state: AppState, mut updates: broadcast::Receiver<StoreMessage>) {
    let shutdown = state.shutdown.clone();
    let stopped = shutdown.wait();
    tokio::pin!(stopped);
    metrics::record_subscribers(state.store.subscriber_count());
    tracing::info!(subscribers = state.store.subscriber_count(), "Subscriber connected");

    loop {
        tokio::select! {
            update = updates.recv() => {
                let message = match update {
                    Ok(message) => message,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Subscriber lagged, resending snapshot");
                        StoreMessage::Snapshot { config: (*state.store.snapshot()).clone() }
                    }
                    Err(RecvError::Closed) => break,
                };
                if send(&mut socket, &message).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = &mut stopped => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    drop(updates);
    metrics::record_subscribers(state.store.subscriber_count());
    tracing::info!("Subscriber disconnected");
}

async fn send(socket: &mut WebSocket, message: &StoreMessage) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode broadcast");
            return Ok(());
        }
    };
    socket.send(Message::Text(payload.into())).await
}

//! Broadcast subscription over WebSocket.
//!
//! # Responsibilities
//! - Keep a WebSocket open to `/api/ws`, reconnecting with backoff
//! - Report `Connected` / `Disconnected` transitions
//! - Decode broadcast frames into [`Update`](crate::model::Update)s
//!
//! Malformed frames are logged and skipped.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::config::ClientConfig;
use crate::model::StoreMessage;
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::transport::TransportEvent;

/// Long-running WebSocket subscriber feeding a Reconciler.
pub struct Subscription {
    url: Url,
    backoff: Backoff,
    events: mpsc::Sender<TransportEvent>,
}

impl Subscription {
    pub fn new(url: Url, config: &ClientConfig, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            url,
            backoff: Backoff::new(config.reconnect_base_delay_ms, config.reconnect_max_delay_ms),
            events,
        }
    }

    /// Run until the event receiver is dropped.
    pub async fn run(mut self) {
        loop {
            match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((socket, _)) => {
                    self.backoff.reset();
                    tracing::info!(url = %self.url, "Subscribed to configuration broadcasts");
                    if self.events.send(TransportEvent::Connected).await.is_err() {
                        return;
                    }

                    if !self.pump(socket).await {
                        return;
                    }

                    tracing::warn!(url = %self.url, "Broadcast subscription lost");
                    if self.events.send(TransportEvent::Disconnected).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(url = %self.url, error = %e, "Subscription connect failed");
                }
            }

            let delay = self.backoff.next_delay();
            tracing::debug!(delay = ?delay, "Reconnecting after delay");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.events.closed() => return,
            }
        }
    }

    /// Forward frames until the socket ends. Returns `false` when the
    /// receiving side is gone and the subscription should stop.
    async fn pump<S>(&mut self, mut socket: S) -> bool
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            tokio::select! {
                frame = socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<StoreMessage>(text.as_str()) {
                            Ok(message) => {
                                let kind = match message {
                                    StoreMessage::Snapshot { .. } => "snapshot",
                                    StoreMessage::Partial { .. } => "partial",
                                };
                                metrics::record_broadcast("received", kind);
                                if self.events.send(TransportEvent::Update(message.into())).await.is_err() {
                                    return false;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Ignoring malformed broadcast frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return true,
                    Some(Ok(_)) => {}
                },
                _ = self.events.closed() => return false,
            }
        }
    }
}

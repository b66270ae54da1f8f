//! Client-side collaborators of the Reconciler.
//!
//! # Data Flow
//! ```text
//! Reconciler ──fetch/push──▶ StoreTransport (http.rs, reqwest)
//! Reconciler ◀──TransportEvent── Subscription (subscription.rs, WebSocket)
//! ```
//!
//! # Design Decisions
//! - Fetch and push are a trait so the Reconciler can run against any Store
//! - Connection state comes only from the subscription lifecycle

pub mod http;
pub mod subscription;

use std::future::Future;
use thiserror::Error;

use crate::model::{Configuration, Update};

pub use http::HttpStoreClient;
pub use subscription::Subscription;

/// Errors talking to the Store.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid store URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Request/response side of the Store.
pub trait StoreTransport: Send + Sync + 'static {
    /// Fetch the full current configuration.
    fn fetch(&self) -> impl Future<Output = Result<Configuration, TransportError>> + Send;

    /// Send a partial update `{category: {setting: value}}`.
    fn push(&self, update: Configuration) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Something observed on the broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Update(Update),
}

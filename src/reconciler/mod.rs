//! Client Reconciler: optimistic edits reconciled against Store broadcasts.
//!
//! # Data Flow
//! ```text
//! apply_local_edit ─▶ state.rs (baseline + Pending Edit) ─▶ view watch channel
//!                        │
//!                        └─▶ debounce.rs (per-key timer) ─▶ push ─▶ Store
//!
//! Subscription ─▶ TransportEvent::Update ─▶ merge ─▶ baseline
//!                                             └─▶ matching Pending Edits resolved
//! ```
//!
//! # Design Decisions
//! - One task owns all state; callers use [`ReconcilerHandle`]
//! - Edits to one key within the debounce window coalesce into one write
//! - A Pending Edit outranks any broadcast for its key until it is echoed,
//!   fails, or its echo timeout elapses
//! - Failed writes are logged and dropped, never retried
//! - Reconnect re-fetches the full configuration when `resync_on_reconnect`

pub mod actor;
pub mod debounce;
pub mod state;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::model::{CoercionError, SettingKey};
use crate::transport::{HttpStoreClient, Subscription, TransportError};

pub use actor::{Reconciler, ReconcilerHandle, ReconcilerStatus};
pub use state::{ConnectionState, PendingEdit, Phase, ReconcilerState};

/// Errors surfaced to Reconciler callers.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration not loaded yet")]
    NotLoaded,

    #[error("unknown setting {0}")]
    UnknownKey(SettingKey),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("reconciler stopped")]
    Closed,
}

/// Capacity of the transport event channel.
const EVENT_BUFFER: usize = 256;

/// Start a Reconciler talking to the Store at `config.store_url`, with a
/// WebSocket subscription feeding it. Call
/// [`initialize`](ReconcilerHandle::initialize) to load the configuration.
pub fn connect(config: &ClientConfig) -> Result<ReconcilerHandle, SyncError> {
    let transport = HttpStoreClient::new(&config.store_url, config.request_timeout())?;
    let ws_url = transport.ws_url()?;

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let subscription = Subscription::new(ws_url, config, events_tx);
    tokio::spawn(subscription.run());

    Ok(Reconciler::spawn(transport, config, events_rx))
}

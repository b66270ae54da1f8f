//! The authoritative configuration holder.

use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::config::{BroadcastMode, StoreConfig};
use crate::model::{merge, Configuration, StoreMessage, Update};
use crate::observability::metrics;
use crate::store::{persistence, StoreError};

/// Holds the current configuration, persists accepted updates and
/// broadcasts them to subscribers.
pub struct ConfigStore {
    current: ArcSwap<Configuration>,
    /// Serialises read-modify-write cycles; readers never take it.
    write_lock: Mutex<()>,
    path: PathBuf,
    config: StoreConfig,
    updates: broadcast::Sender<StoreMessage>,
}

impl ConfigStore {
    /// Load the store file named in `config`.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let path = PathBuf::from(&config.path);
        let initial = persistence::load(&path)?;
        tracing::info!(
            path = %path.display(),
            settings = initial.len(),
            "Configuration store opened"
        );
        Ok(Self::with_initial(config, initial))
    }

    fn with_initial(config: StoreConfig, initial: Configuration) -> Self {
        let (updates, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            current: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
            path: PathBuf::from(&config.path),
            config,
            updates,
        }
    }

    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreMessage> {
        self.updates.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Merge `partial` into the current configuration, persist the result
    /// and broadcast it.
    pub fn update(&self, partial: Configuration) -> Result<Arc<Configuration>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current.load_full();

        if !self.config.allow_new_keys {
            if let Some((key, _)) = partial.entries().find(|(key, _)| !current.contains(key)) {
                return Err(StoreError::UnknownKey(key));
            }
        }

        let update = Update::Partial(partial);
        let next = Arc::new(merge(&current, &update));
        persistence::save(&self.path, &next)?;
        self.current.store(next.clone());

        metrics::record_store_update();
        tracing::info!(settings = update.payload().len(), "Configuration updated");

        let message = match self.config.broadcast_mode {
            BroadcastMode::Snapshot => StoreMessage::Snapshot {
                config: (*next).clone(),
            },
            BroadcastMode::Partial => update.into(),
        };
        self.publish(message);
        Ok(next)
    }

    /// Re-read the store file after an external edit. Returns `false` when
    /// the file matches the current configuration.
    pub fn reload_from_disk(&self) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let loaded = persistence::load(&self.path)?;
        if *self.current.load_full() == loaded {
            return Ok(false);
        }

        tracing::info!(settings = loaded.len(), "Configuration reloaded from disk");
        self.current.store(Arc::new(loaded.clone()));
        self.publish(StoreMessage::Snapshot { config: loaded });
        Ok(true)
    }

    fn publish(&self, message: StoreMessage) {
        let kind = match message {
            StoreMessage::Snapshot { .. } => "snapshot",
            StoreMessage::Partial { .. } => "partial",
        };
        // No subscribers is not an error.
        let receivers = self.updates.send(message).unwrap_or(0);
        metrics::record_broadcast("sent", kind);
        tracing::debug!(kind, receivers, "Broadcast configuration change");
    }
}

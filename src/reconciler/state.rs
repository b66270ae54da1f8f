//! Reconciliation state, free of timers and I/O.
//!
//! Displayed value of a key = its Pending Edit's value if one exists, else
//! the baseline value. The baseline absorbs both optimistic local edits and
//! every remote update; Pending Edits keep a local value on screen while a
//! stale broadcast moves the baseline underneath it.

use std::collections::HashMap;
use tokio::time::Instant;

use crate::model::{merge, Configuration, Scalar, SettingKey, Update};
use crate::reconciler::SyncError;

/// Status of the broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

/// Where a Pending Edit is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the debounce window to close.
    Debouncing,
    /// Came due while disconnected; sent on reconnect.
    Parked,
    /// Sent; waiting for the Store to broadcast it back.
    InFlight,
}

/// A local change not yet confirmed by the Store.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    pub value: Scalar,
    pub submitted_at: Instant,
    pub generation: u64,
    pub phase: Phase,
}

/// What to do with an edit whose debounce window closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    Send(Scalar),
    Park,
    /// Superseded or already resolved.
    Stale,
}

/// Result of merging a remote update.
#[derive(Debug, Default)]
pub struct RemoteOutcome {
    pub applied: bool,
    /// Keys whose Pending Edit was confirmed or dropped.
    pub resolved: Vec<SettingKey>,
}

#[derive(Debug, Default)]
pub struct ReconcilerState {
    baseline: Option<Configuration>,
    pending: HashMap<SettingKey, PendingEdit>,
    connection: ConnectionState,
    next_generation: u64,
}

impl ReconcilerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Returns `true` when the state changed.
    pub fn set_connection(&mut self, connection: ConnectionState) -> bool {
        std::mem::replace(&mut self.connection, connection) != connection
    }

    pub fn pending(&self, key: &SettingKey) -> Option<&PendingEdit> {
        self.pending.get(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Keys in `phase`, with the generation of their current edit.
    pub fn keys_in(&self, phase: Phase) -> Vec<(SettingKey, u64)> {
        let mut keys: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, edit)| edit.phase == phase)
            .map(|(key, edit)| (key.clone(), edit.generation))
            .collect();
        keys.sort();
        keys
    }

    /// Record a user edit. Returns the coerced value and the edit's
    /// generation. Replaces any earlier edit of the same key.
    pub fn apply_local_edit(
        &mut self,
        key: &SettingKey,
        value: Scalar,
        now: Instant,
    ) -> Result<(Scalar, u64), SyncError> {
        let baseline = self.baseline.as_mut().ok_or(SyncError::NotLoaded)?;
        let existing = baseline
            .get_key(key)
            .ok_or_else(|| SyncError::UnknownKey(key.clone()))?;
        let value = value.coerce_like(existing)?;

        baseline.set(key, value.clone());
        self.next_generation += 1;
        let generation = self.next_generation;
        self.pending.insert(
            key.clone(),
            PendingEdit {
                value: value.clone(),
                submitted_at: now,
                generation,
                phase: Phase::Debouncing,
            },
        );
        Ok((value, generation))
    }

    /// Decide what happens to `key`'s edit when its debounce window closes.
    pub fn begin_commit(&mut self, key: &SettingKey, generation: u64) -> Commit {
        let connected = self.connection == ConnectionState::Connected;
        match self.pending.get_mut(key) {
            Some(edit) if edit.generation == generation && edit.phase != Phase::InFlight => {
                if connected {
                    edit.phase = Phase::InFlight;
                    Commit::Send(edit.value.clone())
                } else {
                    edit.phase = Phase::Parked;
                    Commit::Park
                }
            }
            _ => Commit::Stale,
        }
    }

    /// The push for `generation` was accepted. Returns `true` when that edit
    /// is still waiting for its echo.
    pub fn push_succeeded(&self, key: &SettingKey, generation: u64) -> bool {
        self.pending
            .get(key)
            .is_some_and(|edit| edit.generation == generation && edit.phase == Phase::InFlight)
    }

    /// The push for `generation` failed; drop the edit unless a newer one
    /// replaced it. The optimistic baseline value is left in place.
    pub fn push_failed(&mut self, key: &SettingKey, generation: u64) -> bool {
        self.remove_if(key, generation)
    }

    /// No matching broadcast arrived in time; let the baseline show through.
    pub fn echo_expired(&mut self, key: &SettingKey, generation: u64) -> bool {
        self.remove_if(key, generation)
    }

    fn remove_if(&mut self, key: &SettingKey, generation: u64) -> bool {
        if self.pending.get(key).is_some_and(|edit| edit.generation == generation) {
            self.pending.remove(key);
            true
        } else {
            false
        }
    }

    /// Merge a snapshot or partial update from the Store.
    pub fn apply_remote(&mut self, update: &Update) -> RemoteOutcome {
        let next = match (&self.baseline, update) {
            (Some(current), _) => merge(current, update),
            (None, Update::Snapshot(config)) => config.clone(),
            (None, Update::Partial(_)) => return RemoteOutcome::default(),
        };

        let mut resolved = Vec::new();
        for (key, incoming) in update.touched() {
            if self.pending.get(&key).is_some_and(|edit| edit.value == *incoming) {
                self.pending.remove(&key);
                resolved.push(key);
            }
        }
        if update.is_snapshot() {
            let gone: Vec<SettingKey> = self
                .pending
                .keys()
                .filter(|key| !next.contains(key))
                .cloned()
                .collect();
            for key in gone {
                self.pending.remove(&key);
                resolved.push(key);
            }
        }

        self.baseline = Some(next);
        RemoteOutcome {
            applied: true,
            resolved,
        }
    }

    pub fn displayed(&self, key: &SettingKey) -> Option<Scalar> {
        match self.pending.get(key) {
            Some(edit) => Some(edit.value.clone()),
            None => self.baseline.as_ref()?.get_key(key).cloned(),
        }
    }

    /// The configuration as the user should see it; `None` while loading.
    pub fn view(&self) -> Option<Configuration> {
        let mut view = self.baseline.clone()?;
        for (key, edit) in &self.pending {
            view.set(key, edit.value.clone());
        }
        Some(view)
    }
}

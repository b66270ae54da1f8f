//! Per-key timer table.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::SettingKey;

/// What a timer firing means for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// The debounce window closed.
    Commit,
    /// A sent edit saw no matching broadcast in time.
    Echo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub key: SettingKey,
    pub generation: u64,
    pub kind: TimerKind,
}

/// At most one live timer per key. Scheduling a key cancels the timer it
/// had before.
pub struct DebounceTable {
    timers: HashMap<SettingKey, (u64, JoinHandle<()>)>,
    fired: mpsc::UnboundedSender<TimerFired>,
}

impl DebounceTable {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired, rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: HashMap::new(),
                fired,
            },
            rx,
        )
    }

    pub fn schedule(&mut self, key: SettingKey, generation: u64, kind: TimerKind, delay: Duration) {
        let fired = self.fired.clone();
        let event = TimerFired {
            key: key.clone(),
            generation,
            kind,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired.send(event);
        });
        if let Some((_, previous)) = self.timers.insert(key, (generation, handle)) {
            previous.abort();
        }
    }

    pub fn cancel(&mut self, key: &SettingKey) {
        if let Some((_, handle)) = self.timers.remove(key) {
            handle.abort();
        }
    }

    /// Forget a timer that has already fired.
    pub fn fired(&mut self, event: &TimerFired) {
        if self
            .timers
            .get(&event.key)
            .is_some_and(|(generation, _)| *generation == event.generation)
        {
            self.timers.remove(&event.key);
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for DebounceTable {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.timers.drain() {
            handle.abort();
        }
    }
}

//! The Reconciler task and its handle.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::model::{Configuration, Scalar, SettingKey, Update};
use crate::observability::metrics;
use crate::reconciler::debounce::{DebounceTable, TimerFired, TimerKind};
use crate::reconciler::state::{Commit, ConnectionState, Phase, ReconcilerState};
use crate::reconciler::SyncError;
use crate::transport::{StoreTransport, TransportError, TransportEvent};

/// Counters reported by [`ReconcilerHandle::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerStatus {
    pub loaded: bool,
    pub connection: ConnectionState,
    pub pending: usize,
    pub in_flight_pushes: usize,
}

enum Command {
    Initialize {
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
    Edit {
        key: SettingKey,
        value: Scalar,
        reply: oneshot::Sender<Result<Scalar, SyncError>>,
    },
    Remote(Update),
    Flush {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<ReconcilerStatus>,
    },
    Shutdown,
}

enum FetchReason {
    Initialize(oneshot::Sender<Result<(), SyncError>>),
    Resync,
}

enum Completion {
    Fetched {
        reason: FetchReason,
        /// Remote sequence number when the fetch started.
        since: u64,
        result: Result<Configuration, TransportError>,
    },
    Pushed {
        key: SettingKey,
        generation: u64,
        result: Result<(), TransportError>,
    },
}

/// Cloneable entry point for presentation code.
#[derive(Clone)]
pub struct ReconcilerHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<Option<Configuration>>,
    connection: watch::Receiver<ConnectionState>,
}

impl ReconcilerHandle {
    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(make(reply)).map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)
    }

    /// Fetch the full configuration and replace the local one with it.
    pub async fn initialize(&self) -> Result<(), SyncError> {
        self.request(|reply| Command::Initialize { reply }).await?
    }

    /// Apply an edit locally right away and schedule its write. Returns the
    /// value as stored, after coercion to the setting's type.
    pub async fn apply_local_edit(
        &self,
        category: &str,
        setting: &str,
        value: impl Into<Scalar>,
    ) -> Result<Scalar, SyncError> {
        let key = SettingKey::new(category, setting);
        let value = value.into();
        self.request(|reply| Command::Edit { key, value, reply }).await?
    }

    /// Feed an update received outside the built-in subscription.
    pub fn apply_remote_update(&self, update: Update) -> Result<(), SyncError> {
        self.commands
            .send(Command::Remote(update))
            .map_err(|_| SyncError::Closed)
    }

    /// Send every debouncing edit now and wait for all outstanding writes.
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.request(|reply| Command::Flush { reply }).await
    }

    pub async fn status(&self) -> Result<ReconcilerStatus, SyncError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Currently displayed value of one setting.
    pub fn displayed(&self, category: &str, setting: &str) -> Option<Scalar> {
        self.view
            .borrow()
            .as_ref()
            .and_then(|config| config.get(category, setting).cloned())
    }

    /// Currently displayed configuration; `None` while loading.
    pub fn current(&self) -> Option<Configuration> {
        self.view.borrow().clone()
    }

    pub fn view(&self) -> watch::Receiver<Option<Configuration>> {
        self.view.clone()
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Owns the client-side configuration; runs as a single task.
pub struct Reconciler<T> {
    transport: Arc<T>,
    state: ReconcilerState,
    timers: DebounceTable,
    debounce: Duration,
    echo_timeout: Duration,
    resync_on_reconnect: bool,
    in_flight_pushes: usize,
    flush_waiters: Vec<oneshot::Sender<()>>,
    in_flight_fetches: usize,
    /// Count of remote updates received so far.
    remote_seq: u64,
    /// Remote updates received while a fetch is outstanding, replayed over
    /// its snapshot when it lands.
    replay: Vec<(u64, Update)>,
    completions: mpsc::UnboundedSender<Completion>,
    view: watch::Sender<Option<Configuration>>,
    connection: watch::Sender<ConnectionState>,
}

impl<T: StoreTransport> Reconciler<T> {
    /// Start the Reconciler task. `events` carries the broadcast channel's
    /// connection transitions and updates.
    pub fn spawn(
        transport: T,
        config: &ClientConfig,
        events: mpsc::Receiver<TransportEvent>,
    ) -> ReconcilerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(None);
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::Disconnected);
        let (timers, fired_rx) = DebounceTable::new();

        let reconciler = Self {
            transport: Arc::new(transport),
            state: ReconcilerState::new(),
            timers,
            debounce: config.debounce(),
            echo_timeout: config.echo_timeout(),
            resync_on_reconnect: config.resync_on_reconnect,
            in_flight_pushes: 0,
            flush_waiters: Vec::new(),
            in_flight_fetches: 0,
            remote_seq: 0,
            replay: Vec::new(),
            completions: completions_tx,
            view: view_tx,
            connection: connection_tx,
        };
        tokio::spawn(reconciler.run(commands_rx, events, fired_rx, completions_rx));

        ReconcilerHandle {
            commands: commands_tx,
            view: view_rx,
            connection: connection_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::Receiver<TransportEvent>,
        mut fired: mpsc::UnboundedReceiver<TimerFired>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        let mut events_open = true;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        tracing::debug!("Transport event channel closed");
                        events_open = false;
                    }
                },
                Some(timer) = fired.recv() => self.on_timer(timer),
                Some(completion) = completions.recv() => self.on_completion(completion),
            }
            self.publish();
        }
        tracing::debug!(pending = self.state.pending_count(), "Reconciler stopped");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Initialize { reply } => self.fetch(FetchReason::Initialize(reply)),
            Command::Edit { key, value, reply } => {
                let replaced = self
                    .state
                    .pending(&key)
                    .is_some_and(|edit| edit.phase == Phase::Debouncing);
                let result = self
                    .state
                    .apply_local_edit(&key, value, Instant::now())
                    .map(|(value, generation)| {
                        if replaced {
                            metrics::record_write("coalesced");
                        }
                        self.timers
                            .schedule(key.clone(), generation, TimerKind::Commit, self.debounce);
                        tracing::debug!(key = %key, value = %value, generation, "Local edit applied");
                        value
                    });
                // Reply after the view reflects the edit.
                self.publish();
                let _ = reply.send(result);
            }
            Command::Remote(update) => self.on_remote(update),
            Command::Flush { reply } => {
                for (key, generation) in self.state.keys_in(Phase::Debouncing) {
                    self.timers.cancel(&key);
                    self.commit(key, generation);
                }
                if self.in_flight_pushes == 0 {
                    let _ = reply.send(());
                } else {
                    self.flush_waiters.push(reply);
                }
            }
            Command::Status { reply } => {
                let _ = reply.send(ReconcilerStatus {
                    loaded: self.state.is_loaded(),
                    connection: self.state.connection(),
                    pending: self.state.pending_count(),
                    in_flight_pushes: self.in_flight_pushes,
                });
            }
            Command::Shutdown => {}
        }
    }

    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if !self.state.set_connection(ConnectionState::Connected) {
                    return;
                }
                tracing::info!("Connected to configuration store");
                if self.resync_on_reconnect || !self.state.is_loaded() {
                    self.fetch(FetchReason::Resync);
                } else {
                    self.flush_parked();
                }
            }
            TransportEvent::Disconnected => {
                if self.state.set_connection(ConnectionState::Disconnected) {
                    tracing::warn!(pending = self.state.pending_count(), "Disconnected from configuration store");
                }
            }
            TransportEvent::Update(update) => self.on_remote(update),
        }
    }

    fn on_timer(&mut self, timer: TimerFired) {
        self.timers.fired(&timer);
        match timer.kind {
            TimerKind::Commit => self.commit(timer.key, timer.generation),
            TimerKind::Echo => {
                if self.state.echo_expired(&timer.key, timer.generation) {
                    tracing::debug!(key = %timer.key, "No echo for sent edit, showing store value");
                }
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched {
                reason,
                since,
                result,
            } => {
                self.in_flight_fetches -= 1;
                let reply = match reason {
                    FetchReason::Initialize(reply) => Some(reply),
                    FetchReason::Resync => None,
                };
                let outcome = match result {
                    Ok(config) => {
                        tracing::info!(settings = config.len(), "Configuration loaded");
                        self.apply_remote(&Update::Snapshot(config));
                        self.replay_since(since);
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to fetch configuration");
                        Err(SyncError::Transport(e))
                    }
                };
                if self.in_flight_fetches == 0 {
                    self.replay.clear();
                }
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
                if self.state.connection() == ConnectionState::Connected {
                    self.flush_parked();
                }
            }
            Completion::Pushed {
                key,
                generation,
                result,
            } => {
                self.in_flight_pushes -= 1;
                match result {
                    Ok(()) => {
                        metrics::record_write("sent");
                        if self.state.push_succeeded(&key, generation) {
                            self.timers
                                .schedule(key, generation, TimerKind::Echo, self.echo_timeout);
                        }
                    }
                    Err(e) => {
                        metrics::record_write("failed");
                        tracing::warn!(key = %key, error = %e, "Failed to send edit, dropping it");
                        self.state.push_failed(&key, generation);
                    }
                }
                if self.in_flight_pushes == 0 {
                    for waiter in self.flush_waiters.drain(..) {
                        let _ = waiter.send(());
                    }
                }
            }
        }
    }

    fn on_remote(&mut self, update: Update) {
        self.remote_seq += 1;
        self.apply_remote(&update);
        if self.in_flight_fetches > 0 {
            self.replay.push((self.remote_seq, update));
        }
    }

    /// Re-apply updates that arrived after a fetch started, so an older
    /// fetched snapshot never hides them.
    fn replay_since(&mut self, since: u64) {
        let later: Vec<Update> = self
            .replay
            .iter()
            .filter(|(seq, _)| *seq > since)
            .map(|(_, update)| update.clone())
            .collect();
        if later.is_empty() {
            return;
        }
        tracing::debug!(updates = later.len(), "Replaying updates received during fetch");
        for update in &later {
            self.apply_remote(update);
        }
    }

    fn apply_remote(&mut self, update: &Update) {
        let outcome = self.state.apply_remote(update);
        if !outcome.applied {
            tracing::debug!("Ignoring partial update received before the configuration loaded");
            return;
        }
        for key in &outcome.resolved {
            self.timers.cancel(key);
        }
        tracing::debug!(
            snapshot = update.is_snapshot(),
            settings = update.payload().len(),
            resolved = outcome.resolved.len(),
            "Remote update merged"
        );
    }

    fn commit(&mut self, key: SettingKey, generation: u64) {
        match self.state.begin_commit(&key, generation) {
            Commit::Send(value) => self.push(key, generation, value),
            Commit::Park => {
                metrics::record_write("parked");
                tracing::debug!(key = %key, "Disconnected, holding edit until reconnect");
            }
            Commit::Stale => {}
        }
    }

    fn flush_parked(&mut self) {
        for (key, generation) in self.state.keys_in(Phase::Parked) {
            self.commit(key, generation);
        }
    }

    fn push(&mut self, key: SettingKey, generation: u64, value: Scalar) {
        self.in_flight_pushes += 1;
        let transport = self.transport.clone();
        let completions = self.completions.clone();
        tracing::debug!(key = %key, value = %value, "Sending edit");
        tokio::spawn(async move {
            let update = Configuration::single(&key, value);
            let result = transport.push(update).await;
            let _ = completions.send(Completion::Pushed {
                key,
                generation,
                result,
            });
        });
    }

    fn fetch(&mut self, reason: FetchReason) {
        self.in_flight_fetches += 1;
        let since = self.remote_seq;
        let transport = self.transport.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = transport.fetch().await;
            let _ = completions.send(Completion::Fetched {
                reason,
                since,
                result,
            });
        });
    }

    fn publish(&self) {
        let view = self.state.view();
        self.view.send_if_modified(|current| {
            if *current != view {
                *current = view;
                true
            } else {
                false
            }
        });
        let connection = self.state.connection();
        self.connection.send_if_modified(|current| {
            if *current != connection {
                *current = connection;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::merge;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStore {
        config: Mutex<Configuration>,
        pushes: Mutex<Vec<Configuration>>,
        fail_pushes: AtomicBool,
        fail_fetch: AtomicBool,
        /// Fetches read the store, then take this long to answer.
        fetch_delay: Mutex<Option<Duration>>,
    }

    struct MockTransport(Arc<MockStore>);

    impl StoreTransport for MockTransport {
        async fn fetch(&self) -> Result<Configuration, TransportError> {
            if self.0.fail_fetch.load(Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            let config = self.0.config.lock().unwrap().clone();
            let delay = *self.0.fetch_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(config)
        }

        async fn push(&self, update: Configuration) -> Result<(), TransportError> {
            self.0.pushes.lock().unwrap().push(update.clone());
            if self.0.fail_pushes.load(Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: 500,
                    body: "disk full".into(),
                });
            }
            let mut config = self.0.config.lock().unwrap();
            let next = merge(&config, &Update::Partial(update));
            *config = next;
            Ok(())
        }
    }

    struct Harness {
        handle: ReconcilerHandle,
        store: Arc<MockStore>,
        events: mpsc::Sender<TransportEvent>,
    }

    impl Harness {
        fn pushes(&self) -> Vec<Configuration> {
            self.store.pushes.lock().unwrap().clone()
        }

        fn timeout(&self) -> Option<Scalar> {
            self.handle.displayed("server", "timeout_seconds")
        }

        async fn set_connection(&self, state: ConnectionState) {
            let event = match state {
                ConnectionState::Connected => TransportEvent::Connected,
                ConnectionState::Disconnected => TransportEvent::Disconnected,
            };
            self.events.send(event).await.unwrap();
            self.handle
                .connection()
                .wait_for(|current| *current == state)
                .await
                .unwrap();
        }

        async fn pending(&self) -> usize {
            self.handle.status().await.unwrap().pending
        }
    }

    fn config(value: serde_json::Value) -> Configuration {
        serde_json::from_value(value).unwrap()
    }

    fn timeout_is(value: i64) -> Configuration {
        config(json!({ "server": { "timeout_seconds": value } }))
    }

    fn spawn_with(store: Arc<MockStore>) -> Harness {
        let (events, events_rx) = mpsc::channel(16);
        let handle = Reconciler::spawn(MockTransport(store.clone()), &ClientConfig::default(), events_rx);
        Harness { handle, store, events }
    }

    async fn loaded(initial: serde_json::Value) -> Harness {
        let store = Arc::new(MockStore::default());
        *store.config.lock().unwrap() = config(initial);
        let harness = spawn_with(store);
        harness.set_connection(ConnectionState::Connected).await;
        harness.handle.initialize().await.unwrap();
        harness
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_sends_one_write() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        for _ in 0..3 {
            let stored = h.handle.apply_local_edit("server", "timeout_seconds", "45").await.unwrap();
            assert_eq!(stored, Scalar::from(45));
            assert_eq!(h.timeout(), Some(Scalar::from(45)));
            sleep_ms(70).await;
        }
        assert!(h.pushes().is_empty());

        sleep_ms(600).await;
        assert_eq!(h.pushes(), vec![timeout_is(45)]);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_edit_in_window_is_the_one_sent() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        h.handle.apply_local_edit("server", "timeout_seconds", 40).await.unwrap();
        sleep_ms(100).await;
        h.handle.apply_local_edit("server", "timeout_seconds", 42).await.unwrap();
        sleep_ms(100).await;
        h.handle.apply_local_edit("server", "timeout_seconds", 44).await.unwrap();
        sleep_ms(600).await;

        assert_eq!(h.pushes(), vec![timeout_is(44)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_to_different_keys_are_independent() {
        let h = loaded(json!({
            "server": { "timeout_seconds": 30 },
            "features": { "caching_enabled": false }
        }))
        .await;

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        h.handle.apply_local_edit("features", "caching_enabled", true).await.unwrap();
        sleep_ms(600).await;

        let pushes = h.pushes();
        assert_eq!(pushes.len(), 2);
        assert!(pushes.contains(&timeout_is(45)));
        assert!(pushes.contains(&config(json!({ "features": { "caching_enabled": true } }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_broadcast_does_not_replace_pending_edit() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        h.handle.apply_remote_update(Update::Partial(timeout_is(30))).unwrap();
        assert_eq!(h.pending().await, 1);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));

        sleep_ms(600).await;
        assert_eq!(h.pushes(), vec![timeout_is(45)]);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_clears_pending_edit() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        sleep_ms(600).await;
        assert_eq!(h.pending().await, 1);

        h.handle.apply_remote_update(Update::Snapshot(timeout_is(45))).unwrap();
        assert_eq!(h.pending().await, 0);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));

        // With nothing pending the Store's value shows as-is.
        h.handle.apply_remote_update(Update::Partial(timeout_is(60))).unwrap();
        h.pending().await;
        assert_eq!(h.timeout(), Some(Scalar::from(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_broadcast_cancels_debouncing_write() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        sleep_ms(100).await;
        h.handle.apply_remote_update(Update::Snapshot(timeout_is(45))).unwrap();
        assert_eq!(h.pending().await, 0);

        sleep_ms(700).await;
        assert!(h.pushes().is_empty());
        assert_eq!(h.timeout(), Some(Scalar::from(45)));
    }

    async fn reconnect_with_slow_fetch(h: &Harness) {
        *h.store.fetch_delay.lock().unwrap() = Some(Duration::from_millis(100));
        h.set_connection(ConnectionState::Disconnected).await;
        h.set_connection(ConnectionState::Connected).await;
        // Let the resync fetch read the store before the test moves on.
        sleep_ms(1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_during_resync_survives_older_snapshot() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;
        reconnect_with_slow_fetch(&h).await;

        // The resync fetch has already read 30 when the Store moves on.
        *h.store.config.lock().unwrap() = timeout_is(60);
        h.events
            .send(TransportEvent::Update(Update::Partial(timeout_is(60))))
            .await
            .unwrap();
        sleep_ms(10).await;
        assert_eq!(h.timeout(), Some(Scalar::from(60)));

        sleep_ms(200).await;
        assert_eq!(h.handle.status().await.unwrap().pending, 0);
        assert_eq!(h.timeout(), Some(Scalar::from(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_edit_survives_older_snapshot() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;
        reconnect_with_slow_fetch(&h).await;

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        h.handle.flush().await.unwrap();
        h.handle.apply_remote_update(Update::Partial(timeout_is(45))).unwrap();
        assert_eq!(h.pending().await, 0);

        sleep_ms(200).await;
        assert_eq!(h.pushes(), vec![timeout_is(45)]);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_keeps_view_and_holds_edits() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;
        let before = h.handle.current();

        h.set_connection(ConnectionState::Disconnected).await;
        assert_eq!(h.handle.current(), before);
        assert_eq!(h.handle.connection_state(), ConnectionState::Disconnected);

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        sleep_ms(600).await;
        assert!(h.pushes().is_empty());
        assert_eq!(h.pending().await, 1);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));

        h.set_connection(ConnectionState::Connected).await;
        sleep_ms(10).await;
        assert_eq!(h.pushes(), vec![timeout_is(45)]);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_dropped_without_rollback() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;
        h.store.fail_pushes.store(true, Ordering::SeqCst);

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        sleep_ms(600).await;

        assert_eq!(h.pushes().len(), 1);
        assert_eq!(h.pending().await, 0);
        assert_eq!(h.timeout(), Some(Scalar::from(45)));

        sleep_ms(10_000).await;
        assert_eq!(h.pushes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_timeout_lets_competing_write_show() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        sleep_ms(600).await;

        // Another session's write was accepted after ours.
        h.handle.apply_remote_update(Update::Partial(timeout_is(50))).unwrap();
        h.pending().await;
        assert_eq!(h.timeout(), Some(Scalar::from(45)));

        sleep_ms(5_000).await;
        assert_eq!(h.pending().await, 0);
        assert_eq!(h.timeout(), Some(Scalar::from(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_initialize_stays_loading() {
        let store = Arc::new(MockStore::default());
        store.fail_fetch.store(true, Ordering::SeqCst);
        let h = spawn_with(store);

        let err = h.handle.initialize().await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert!(h.handle.current().is_none());

        let err = h
            .handle
            .apply_local_edit("server", "timeout_seconds", 45)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotLoaded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_loads_when_initialize_failed() {
        let store = Arc::new(MockStore::default());
        *store.config.lock().unwrap() = timeout_is(30);
        store.fail_fetch.store(true, Ordering::SeqCst);
        let h = spawn_with(store);
        assert!(h.handle.initialize().await.is_err());

        h.store.fail_fetch.store(false, Ordering::SeqCst);
        h.set_connection(ConnectionState::Connected).await;
        sleep_ms(10).await;

        assert_eq!(h.timeout(), Some(Scalar::from(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_sends_without_waiting_for_window() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        h.handle.apply_local_edit("server", "timeout_seconds", 45).await.unwrap();
        h.handle.flush().await.unwrap();

        assert_eq!(h.pushes(), vec![timeout_is(45)]);
        assert_eq!(h.handle.status().await.unwrap().in_flight_pushes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_edits_are_rejected() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;

        let err = h.handle.apply_local_edit("server", "port", 8080).await.unwrap_err();
        assert!(matches!(err, SyncError::UnknownKey(_)));

        let err = h
            .handle
            .apply_local_edit("server", "timeout_seconds", "later")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Coercion(_)));
        assert_eq!(h.timeout(), Some(Scalar::from(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_handle() {
        let h = loaded(json!({ "server": { "timeout_seconds": 30 } })).await;
        h.handle.shutdown();
        sleep_ms(1).await;
        assert!(matches!(h.handle.status().await, Err(SyncError::Closed)));
    }
}

//! Store file watcher for external edits.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::store::ConfigStore;

/// Quiet period used to collapse the burst of events one save produces.
const SETTLE: Duration = Duration::from_millis(100);

/// Watches the directory holding the store file and reloads the store when
/// the file changes.
pub struct StoreWatcher {
    store: Arc<ConfigStore>,
    path: PathBuf,
}

impl StoreWatcher {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let path = store.path().to_path_buf();
        Self { store, path }
    }

    /// Start watching. The returned watcher must be kept alive for events to
    /// keep flowing; the reload task exits on shutdown.
    pub fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<RecommendedWatcher, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Saves replace the file through a rename, so watch its directory.
        let dir = watch_dir(&self.path);
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Store file watcher started");

        let store = self.store;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        if event.is_none() {
                            break;
                        }
                        tokio::time::sleep(SETTLE).await;
                        while rx.try_recv().is_ok() {}

                        match store.reload_from_disk() {
                            Ok(true) => tracing::info!("Store file change applied"),
                            Ok(false) => {}
                            Err(e) => tracing::error!(
                                "Failed to reload store file: {}. Keeping current configuration.",
                                e
                            ),
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });

        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

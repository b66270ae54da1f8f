//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

use live_config::config::{AppConfig, ClientConfig, StoreConfig};
use live_config::{ConfigStore, HttpServer, Shutdown};

pub const SEED: &str = r#"
[server]
timeout_seconds = 30
log_level = "info"

[features]
caching_enabled = false
"#;

/// A Store server on an ephemeral port, backed by a temporary file.
pub struct TestStore {
    pub addr: SocketAddr,
    pub store: Arc<ConfigStore>,
    pub shutdown: Shutdown,
    _dir: TempDir,
}

impl TestStore {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client settings pointed at this server, with a short debounce window.
    pub fn client(&self) -> ClientConfig {
        ClientConfig {
            store_url: self.url(),
            debounce_ms: 50,
            reconnect_base_delay_ms: 50,
            reconnect_max_delay_ms: 200,
            ..ClientConfig::default()
        }
    }
}

impl Drop for TestStore {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a Store server seeded with [`SEED`].
pub async fn start_store(configure: impl FnOnce(&mut StoreConfig)) -> TestStore {
    start_store_file("config.toml", SEED, configure).await
}

/// Start a Store server whose store file is `file_name`, holding `seed`.
pub async fn start_store_file(
    file_name: &str,
    seed: &str,
    configure: impl FnOnce(&mut StoreConfig),
) -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(file_name);
    std::fs::write(&path, seed).unwrap();

    let mut config = AppConfig::default();
    config.store.path = path.to_string_lossy().into_owned();
    config.store.watch_file = false;
    configure(&mut config.store);

    let store = Arc::new(ConfigStore::open(config.store.clone()).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, store.clone(), shutdown.clone());
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    TestStore {
        addr,
        store,
        shutdown,
        _dir: dir,
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

//! Configuration schema definitions.
//!
//! This module defines the service configuration for both the Store server
//! and the Reconciler client. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the live-config service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Store persistence and broadcast settings.
    pub store: StoreConfig,

    /// Reconciler client settings.
    pub client: ClientConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// What the Store publishes after accepting an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// The whole configuration after the update.
    #[default]
    Snapshot,
    /// Only the settings carried by the update.
    Partial,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the TOML file holding the configuration.
    pub path: String,

    /// Shape of the broadcast sent after each accepted update.
    pub broadcast_mode: BroadcastMode,

    /// Accept updates that introduce categories or settings the Store
    /// does not know yet.
    pub allow_new_keys: bool,

    /// Reload and broadcast when the file is edited externally.
    pub watch_file: bool,

    /// Capacity of the broadcast channel per subscriber.
    pub broadcast_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "config/config.toml".to_string(),
            broadcast_mode: BroadcastMode::Snapshot,
            allow_new_keys: true,
            watch_file: true,
            broadcast_capacity: 64,
        }
    }
}

/// Reconciler client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the Store (e.g., "http://127.0.0.1:8000").
    pub store_url: String,

    /// Quiet period after the last edit to a key before it is sent.
    pub debounce_ms: u64,

    /// How long a sent edit waits for its broadcast before the Store's
    /// value takes over the display.
    pub echo_timeout_ms: u64,

    /// Fetch/push request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Re-fetch the full configuration after every reconnect.
    pub resync_on_reconnect: bool,

    /// Base delay for subscription reconnect backoff in milliseconds.
    pub reconnect_base_delay_ms: u64,

    /// Maximum delay for subscription reconnect backoff in milliseconds.
    pub reconnect_max_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: "http://127.0.0.1:8000".to_string(),
            debounce_ms: 500,
            echo_timeout_ms: 5000,
            request_timeout_secs: 10,
            resync_on_reconnect: true,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 10_000,
        }
    }
}

impl ClientConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Timeout configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

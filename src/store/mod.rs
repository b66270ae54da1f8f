//! Config Store: the authoritative side of the system.
//!
//! # Data Flow
//! ```text
//! POST /api/config (partial)
//!     → state.rs (merge under write lock)
//!     → persistence.rs (atomic TOML or YAML write)
//!     → ArcSwap swap of the current snapshot
//!     → broadcast channel → every /api/ws session
//!
//! External edit of the store file:
//!     watcher.rs → reload → snapshot broadcast
//! ```
//!
//! # Design Decisions
//! - Reads are lock-free; writes are serialised
//! - Concurrent writers: last write accepted wins, no versioning

pub mod persistence;
pub mod state;
pub mod watcher;

use thiserror::Error;

use crate::model::SettingKey;

pub use state::ConfigStore;
pub use watcher::StoreWatcher;

/// Errors raised by the Store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file could not be written: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("store file is malformed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("store file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown setting {0}")]
    UnknownKey(SettingKey),
}

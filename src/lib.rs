//! Live configuration service: an authoritative Config Store and the client
//! Reconciler that keeps an optimistic local view in sync with it.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod reconciler;
pub mod resilience;
pub mod store;
pub mod transport;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use model::{Configuration, Scalar, SettingKey, Update};
pub use reconciler::{connect, ConnectionState, ReconcilerHandle, SyncError};
pub use store::ConfigStore;

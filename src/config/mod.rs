//! Service configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → listener/store sections to the Store server
//!     → client section to each Reconciler
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//!
//! This is the service's own configuration. The nested settings the service
//! manages live in [`crate::model`].

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, BroadcastMode, ClientConfig, ListenerConfig, ObservabilityConfig, StoreConfig,
    TimeoutConfig,
};

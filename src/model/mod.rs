//! Configuration data model shared by the Store and the Reconciler.
//!
//! # Data Flow
//! ```text
//! GET /api/config ─▶ Configuration (snapshot)
//! POST /api/config ◀─ Configuration (single-field partial)
//! WS frame ─▶ StoreMessage ─▶ Update ─▶ merge(old, update) ─▶ new Configuration
//! ```
//!
//! # Design Decisions
//! - Exactly two levels: category → setting → scalar
//! - Insertion order is preserved for display, ignored for equality
//! - `merge` never mutates its input; callers swap in the returned snapshot

pub mod configuration;
pub mod merge;
pub mod message;
pub mod scalar;

pub use configuration::{Category, Configuration, SettingKey};
pub use merge::{merge, Update};
pub use message::StoreMessage;
pub use scalar::{CoercionError, Scalar, ScalarKind};

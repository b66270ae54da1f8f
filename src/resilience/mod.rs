//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Subscription lost:
//!     → backoff.rs (exponential delay with jitter)
//!     → reconnect attempt
//!     → success resets the schedule
//! ```
//!
//! Failed writes are not retried; see [`crate::reconciler`].

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff};

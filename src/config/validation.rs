//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, delays ordered)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("client.store_url: {0}")]
    InvalidStoreUrl(String),

    #[error("client.reconnect_base_delay_ms ({base}) exceeds client.reconnect_max_delay_ms ({max})")]
    BackoffOrder { base: u64, max: u64 },

    #[error("store.path must not be empty")]
    EmptyStorePath,
}

/// Validate `config`, collecting every error found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.store.path.trim().is_empty() {
        errors.push(ValidationError::EmptyStorePath);
    }

    let nonzero = [
        ("store.broadcast_capacity", config.store.broadcast_capacity as u64),
        ("client.debounce_ms", config.client.debounce_ms),
        ("client.echo_timeout_ms", config.client.echo_timeout_ms),
        ("client.request_timeout_secs", config.client.request_timeout_secs),
        ("client.reconnect_base_delay_ms", config.client.reconnect_base_delay_ms),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.client.reconnect_base_delay_ms > config.client.reconnect_max_delay_ms {
        errors.push(ValidationError::BackoffOrder {
            base: config.client.reconnect_base_delay_ms,
            max: config.client.reconnect_max_delay_ms,
        });
    }

    match Url::parse(&config.client.store_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::InvalidStoreUrl(format!(
            "unsupported scheme {:?}",
            url.scheme()
        ))),
        Err(e) => errors.push(ValidationError::InvalidStoreUrl(e.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

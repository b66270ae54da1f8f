//! REST handlers for the Store API.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::model::Configuration;
use crate::store::StoreError;

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub subscribers: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
        subscribers: state.store.subscriber_count(),
    })
}

/// `GET /api/config`: the full current configuration.
pub async fn get_config(State(state): State<AppState>) -> Json<Configuration> {
    Json(Configuration::clone(&state.store.snapshot()))
}

/// `POST /api/config`: merge a partial update, returning the full result.
///
/// The merge persists the store file, so it runs on the blocking pool.
pub async fn update_config(
    State(state): State<AppState>,
    Json(partial): Json<Configuration>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let result = match tokio::task::spawn_blocking(move || store.update(partial)).await {
        Ok(result) => result,
        Err(e) => Err(StoreError::Io(std::io::Error::other(e))),
    };
    match result {
        Ok(next) => Json(Configuration::clone(&next)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected configuration update");
            e.into_response()
        }
    }
}

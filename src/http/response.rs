//! Error responses.
//!
//! Store errors map to HTTP status codes:
//! - unknown setting → 422 Unprocessable Entity
//! - persistence failure → 500 Internal Server Error

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match self {
            StoreError::UnknownKey(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Io(_)
            | StoreError::Serialize(_)
            | StoreError::Parse(_)
            | StoreError::Yaml(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

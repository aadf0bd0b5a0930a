use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Share endpoint failures, rendered as `{success: false, error}`
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Invalid data provided")]
    InvalidData,

    #[error("Snapshot not found")]
    NotFound,

    #[error("Server error")]
    Storage(#[source] anyhow::Error),
}

impl ShareError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShareError::InvalidData => StatusCode::BAD_REQUEST,
            ShareError::NotFound => StatusCode::NOT_FOUND,
            ShareError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        if let ShareError::Storage(e) = &self {
            tracing::error!(error = %e, "Snapshot storage failed");
        }
        let body = json!({ "success": false, "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

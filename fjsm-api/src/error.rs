//! Maps `FjsmError` to the HTTP responses the API edge is responsible for
//! (spec.md §7): input/lock validation failures are 4xx, everything else
//! that still manages to surface here (it usually doesn't — the Run
//! Coordinator catches domain failures and records them as `FAILED` runs
//! instead) is a 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fjsm_model::FjsmError;
use serde_json::json;

pub struct ApiError(pub FjsmError);

impl From<FjsmError> for ApiError {
    fn from(err: FjsmError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FjsmError::InputError(_) | FjsmError::InvalidLock { .. } => StatusCode::BAD_REQUEST,
            FjsmError::RunNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

pub const ITEM_NOT_FOUND: &str = "Item not found";
const SERVER_ERROR: &str = "Server error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn item_not_found() -> Self {
        Self::NotFound(ITEM_NOT_FOUND.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            // Store detail stays in the logs.
            AppError::Store(err) => {
                error!(error = %err, "Item store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

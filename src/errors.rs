use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Failures raised by the catalog service and the image stores.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("stamp `{0}` not found")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("missing or invalid admin credentials")]
    Unauthorized,
    #[error("image upload failed: {0}")]
    Upload(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Convert into an HTTP error. Storage, filesystem and upload failures
    /// are logged with their cause and reported with `fallback` only.
    pub fn into_app_error(self, fallback: &str) -> AppError {
        match self {
            CatalogError::NotFound(_) => AppError::not_found("Stamp not found"),
            CatalogError::Validation(msg) => AppError::bad_request(msg),
            CatalogError::Unauthorized => {
                AppError::new(StatusCode::UNAUTHORIZED, "Unauthorized")
            }
            other => {
                tracing::error!(error = %other, "{}", fallback);
                AppError::internal(fallback)
            }
        }
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

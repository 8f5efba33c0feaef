use crate::services::garment_store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::io;
use thiserror::Error;

/// Failures coming back from the external collaborators (object storage,
/// background removal, completion API).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Remove.bg error {status}: {body}")]
    BackgroundRemoval { status: u16, body: String },
    #[error("Completion error: {0}")]
    Completion(String),
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key")]
    InvalidKey,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Request-level error. Every variant renders as `{"error": message}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    MissingParameter(String),
    #[error("No se recibió imagen ni imagen_url.")]
    MissingImage,
    /// A request body the extractor refused, with the status it chose
    /// (400 for malformed forms, 413 past the body limit).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// `Falta {name}` for a single absent field.
    pub fn missing(name: &str) -> Self {
        Self::MissingParameter(format!("Falta {}", name))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingParameter(_) | AppError::MissingImage => StatusCode::BAD_REQUEST,
            AppError::Rejected { status, .. } => *status,
            AppError::Provider(ProviderError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Provider(ProviderError::InvalidKey) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed: {}", self);
        } else {
            tracing::warn!("request rejected ({}): {}", status.as_u16(), self);
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

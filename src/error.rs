use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures raised by sync logic and the remote service clients. The first
/// four variants mirror the distinct responses of the source platform's
/// cluster-discovery endpoint.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("wrong parameters: {0}")]
    WrongParams(String),
    #[error("remote service error: {0}")]
    RemoteService(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl SyncError {
    /// Transient failures worth retrying against the remote side.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::RemoteService(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(value: reqwest::Error) -> Self {
        SyncError::RemoteService(value.to_string())
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

// Missing rows surface as 400 with a message body, matching the rest of the
// API's "not found" conditions.
impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::bad_request("resource not found"),
            _ => AppError::internal(value),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::Unauthorized(_)
            | SyncError::NotFound(_)
            | SyncError::WrongParams(_)
            | SyncError::RemoteService(_)
            | SyncError::Configuration(_)
            | SyncError::Format(_) => AppError::bad_request(value.to_string()),
            SyncError::Database(err) => AppError::from(err),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::security::HashError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Password hash error: {0}")]
    Hash(#[from] HashError),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Share not found")]
    ShareNotFound,

    #[error("File or directory not found")]
    PathNotFound,

    #[error("File or directory already exists")]
    PathAlreadyExists,

    #[error("File already shared with user")]
    AlreadyShared,

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("No session present")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Malformed session token")]
    MalformedToken,

    #[error("Session not found")]
    SessionNotFound,
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            AppError::Store(ref e) => {
                tracing::error!("Store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to query database")
            }
            AppError::Io(ref e) => {
                tracing::error!("Filesystem error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "filesystem operation failed")
            }
            AppError::Serialization(ref e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            AppError::Hash(ref e) => {
                tracing::error!("Password hash error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to verify password")
            }
            AppError::TaskJoin(ref e) => {
                tracing::error!("Task join error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            AppError::InvalidInput(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::UserAlreadyExists => {
                (StatusCode::CONFLICT, "specified username is already in use")
            }
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "specified user does not exist"),
            AppError::ChatNotFound => (StatusCode::NOT_FOUND, "specified chat does not exist"),
            AppError::ShareNotFound => (StatusCode::NOT_FOUND, "specified share does not exist"),
            AppError::PathNotFound => (
                StatusCode::NOT_FOUND,
                "specified file/directory does not exist",
            ),
            AppError::PathAlreadyExists => (
                StatusCode::CONFLICT,
                "specified file/directory already exists",
            ),
            AppError::AlreadyShared => (StatusCode::CONFLICT, "already shared with user"),
            AppError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "upload exceeds size limit")
            }
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, msg.as_str()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "no session present"),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid username or password")
            }
            // Malformed and unknown tokens are indistinguishable to the client
            AppError::MalformedToken | AppError::SessionNotFound => {
                (StatusCode::UNAUTHORIZED, "invalid session")
            }
        };

        let body = Json(json!({
            "status": "error",
            "reason": reason,
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;

//! Error types for Pustaka server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchRecord = 4,
    BadValue = 5,
    InvalidTransition = 6,
    OutOfStock = 7,
    AlreadyBorrowed = 8,
    Conflict = 9,
    MediaFailure = 10,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Attempted state change is not legal from the record's current status.
    /// Also surfaced to the loser of a concurrent-writer race (§ single-writer
    /// discipline): the conditional update matched zero rows.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Already borrowed: {0}")]
    AlreadyBorrowed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Media storage error: {0}")]
    Media(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchRecord, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, ErrorCode::InvalidTransition, msg.clone())
            }
            AppError::OutOfStock(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::OutOfStock, msg.clone())
            }
            AppError::AlreadyBorrowed(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::AlreadyBorrowed, msg.clone())
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Conflict, msg.clone())
            }
            AppError::Media(msg) => {
                tracing::error!("Media storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::MediaFailure, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_maps_to_conflict() {
        let resp = AppError::InvalidTransition("loan 1 is not Requested".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn out_of_stock_is_distinguishable_from_already_borrowed() {
        assert_ne!(ErrorCode::OutOfStock as u32, ErrorCode::AlreadyBorrowed as u32);
    }
}

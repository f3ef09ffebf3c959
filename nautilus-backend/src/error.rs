use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nautilus_db::{DbError, PlayerId};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::provider::ProviderError;

/// Failures of the profile directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("profile not found")]
    NotFound,

    #[error("several profiles are named {name:?} and none currently owns it")]
    AmbiguousName { name: String },

    #[error("profile store unavailable: {0}")]
    StoreUnavailable(DbError),

    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// A connected-player operation was issued for a player that is not cached.
    #[error("no cached profile for connected player {0}")]
    InvariantViolation(PlayerId),
}

impl From<DbError> for DirectoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ProfileNotFound => DirectoryError::NotFound,
            other => DirectoryError::StoreUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Directory(DirectoryError),
    ValidationError(String),
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Directory(err) => {
                let (status, response) = match &err {
                    DirectoryError::NotFound => {
                        (StatusCode::NOT_FOUND, ErrorResponse::new("Profile not found"))
                    }
                    DirectoryError::AmbiguousName { name } => (
                        StatusCode::CONFLICT,
                        ErrorResponse::with_details(
                            "Player name is ambiguous",
                            format!("several players used the name {name}"),
                        ),
                    ),
                    DirectoryError::InvariantViolation(id) => {
                        tracing::error!(%id, "event for a player that was never admitted");
                        (
                            StatusCode::CONFLICT,
                            ErrorResponse::with_details(
                                "Player is not connected",
                                "send pre-connect before other lifecycle events",
                            ),
                        )
                    }
                    DirectoryError::ProviderUnavailable(_) => {
                        tracing::warn!(error = %err, "identity provider error");
                        (
                            StatusCode::BAD_GATEWAY,
                            ErrorResponse::new("Identity provider unavailable. Please try again later."),
                        )
                    }
                    DirectoryError::Timeout { .. } => {
                        tracing::warn!(error = %err, "directory operation timed out");
                        (
                            StatusCode::GATEWAY_TIMEOUT,
                            ErrorResponse::new("The operation timed out. Please try again later."),
                        )
                    }
                    DirectoryError::StoreUnavailable(db_err) => {
                        // Don't expose internal database errors
                        tracing::error!(?db_err, "Internal database error");
                        (
                            StatusCode::SERVICE_UNAVAILABLE,
                            ErrorResponse::new("An internal error occurred. Please try again later."),
                        )
                    }
                };

                (status, Json(response)).into_response()
            }
            AppError::ValidationError(msg) => {
                tracing::warn!(validation_error = %msg, "Validation failed");
                let error_response = ErrorResponse::new(msg);
                (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Invalid host token")),
            )
                .into_response(),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        AppError::Directory(err)
    }
}

impl From<crate::validation::ValidationError> for AppError {
    fn from(err: crate::validation::ValidationError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_profile_update_maps_to_not_found() {
        assert!(matches!(
            DirectoryError::from(DbError::ProfileNotFound),
            DirectoryError::NotFound
        ));
        assert!(matches!(
            DirectoryError::from(DbError::DuplicateProfile),
            DirectoryError::StoreUnavailable(DbError::DuplicateProfile)
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (DirectoryError::NotFound, StatusCode::NOT_FOUND),
            (
                DirectoryError::AmbiguousName { name: "Notch".into() },
                StatusCode::CONFLICT,
            ),
            (
                DirectoryError::InvariantViolation(PlayerId::nil()),
                StatusCode::CONFLICT,
            ),
            (
                DirectoryError::ProviderUnavailable(ProviderError::Malformed("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                DirectoryError::Timeout {
                    operation: "find profile",
                    timeout: Duration::from_secs(1),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                DirectoryError::StoreUnavailable(DbError::DuplicateProfile),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}

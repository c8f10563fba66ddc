//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{models::license::LicenseStatus, services::token_service::TokenError};

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Not found**: unknown license key, device or license id
/// - **Invalid state**: license is not active, or has just expired
/// - **Conflict**: device bound to another license, duplicate license key
/// - **Unauthorized**: bad device token, bad admin credentials or session
/// - **Storage**: any sqlx::Error (details are logged, never returned)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unexpected failure outside the database (password hashing, token signing).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// No license with the given key or id.
    #[error("Invalid license key")]
    LicenseNotFound,

    /// No device registered under the token subject.
    #[error("Device not found")]
    DeviceNotFound,

    /// License status is already `expired` or `revoked`.
    #[error("License is not active")]
    LicenseInactive(LicenseStatus),

    /// License passed its expiry during this check.
    #[error("License has expired")]
    LicenseExpired,

    /// Device identifier is already bound to a different license.
    #[error("Device already registered with different license")]
    DeviceConflict,

    /// License key already exists.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("License key already exists")]
    DuplicateKey,

    /// Device bearer token missing, expired or invalid.
    #[error(transparent)]
    Unauthorized(#[from] TokenError),

    /// Admin login failed.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Admin session cookie missing, unknown or expired.
    #[error("Authentication required")]
    AdminUnauthenticated,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "license_inactive",
///     "message": "License is not active"
///   },
///   "status": "revoked"
/// }
/// ```
///
/// `status` is only present for license state failures.
///
/// # Status Code Mapping
///
/// - `InvalidRequest`, `LicenseInactive`, `LicenseExpired`, `DeviceConflict` → 400
/// - `Unauthorized`, `InvalidCredentials`, `AdminUnauthenticated` → 401
/// - `LicenseNotFound`, `DeviceNotFound` → 404
/// - `DuplicateKey` → 409
/// - `Database`, `Internal` → 500 (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut license_status = None;

        let (status, code, message) = match self {
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::LicenseNotFound => {
                (StatusCode::NOT_FOUND, "license_not_found", self.to_string())
            }
            AppError::DeviceNotFound => {
                (StatusCode::NOT_FOUND, "device_not_found", self.to_string())
            }
            AppError::LicenseInactive(current) => {
                license_status = Some(current);
                (StatusCode::BAD_REQUEST, "license_inactive", self.to_string())
            }
            AppError::LicenseExpired => {
                license_status = Some(LicenseStatus::Expired);
                (StatusCode::BAD_REQUEST, "license_expired", self.to_string())
            }
            AppError::DeviceConflict => {
                (StatusCode::BAD_REQUEST, "device_conflict", self.to_string())
            }
            AppError::DuplicateKey => (StatusCode::CONFLICT, "duplicate_key", self.to_string()),
            AppError::Unauthorized(ref err) => {
                (StatusCode::UNAUTHORIZED, err.code(), self.to_string())
            }
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AppError::AdminUnauthenticated => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", self.to_string())
            }
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        if let Some(current) = license_status {
            body["status"] = json!(current);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn business_errors_map_to_client_statuses() {
        assert_eq!(status_of(AppError::LicenseNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::DeviceNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::LicenseInactive(LicenseStatus::Revoked)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::LicenseExpired), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::DeviceConflict), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::DuplicateKey), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AppError::InvalidRequest("Missing required fields".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn token_errors_are_unauthorized() {
        for err in [TokenError::Missing, TokenError::Expired, TokenError::Invalid] {
            assert_eq!(status_of(err.into()), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(status_of(AppError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::AdminUnauthenticated), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn storage_errors_hide_details() {
        assert_eq!(
            status_of(AppError::Database(sqlx::Error::RowNotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::Internal("argon2 exploded".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

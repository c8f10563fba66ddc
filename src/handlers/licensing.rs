//! Machine-facing license HTTP handlers.
//!
//! This module implements the endpoints client applications call:
//! - POST /activate - Bind a device to a license and get a token
//! - POST /validate - Check that a token holder's license is still usable

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};

use crate::{
    AppState,
    error::AppError,
    models::{
        audit_log::ClientMeta,
        device::{ActivateRequest, ActivateResponse, ValidateResponse},
    },
    services::{
        activation_service::{self, Activation},
        token_service::DeviceClaims,
    },
};

/// Activate a license on a device.
///
/// # Endpoint
///
/// `POST /activate`
///
/// # Request Body
///
/// ```json
/// {
///   "license_key": "KEY-A",
///   "device_id": "dev1",
///   "device_info": "Pixel 8"  // optional
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: token for the device
/// - **Error (400)**: missing fields, license inactive/expired, device bound elsewhere
/// - **Error (404)**: unknown license key
/// - **Error (500)**: database error
///
/// ```json
/// {
///   "success": true,
///   "token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
///   "license_status": "active",
///   "expires_at": "2026-10-24T10:00:00Z"
/// }
/// ```
///
/// Activating the same device on the same license again returns a fresh
/// token without creating anything.
pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Json<ActivateResponse>, AppError> {
    let Json(request) = payload?;
    let activation = Activation::try_from(request)?;

    let response = activation_service::activate(
        &state.pool,
        &state.tokens,
        activation,
        ClientMeta::from_headers(&headers),
    )
    .await?;

    Ok(Json(response))
}

/// Validate the license of a token holder.
///
/// # Endpoint
///
/// `POST /validate`
///
/// # Authentication
///
/// Requires the device token in `Authorization: Bearer <token>`
/// (checked by the device token middleware).
///
/// # Response
///
/// - **Success (200 OK)**: license still usable
/// - **Error (401)**: token missing, expired or invalid
/// - **Error (404)**: device or license not found
/// - **Error (400)**: license inactive or expired (body includes `status`)
///
/// ```json
/// {
///   "valid": true,
///   "license_status": "active",
///   "expires_at": "2026-10-24T10:00:00Z",
///   "days_remaining": 6
/// }
/// ```
pub async fn validate(
    State(state): State<AppState>,
    Extension(claims): Extension<DeviceClaims>,
    headers: HeaderMap,
) -> Result<Json<ValidateResponse>, AppError> {
    let response =
        activation_service::validate(&state.pool, &claims, ClientMeta::from_headers(&headers))
            .await?;

    Ok(Json(response))
}

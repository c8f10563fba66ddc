//! Administrative HTTP handlers.
//!
//! This module implements the admin endpoints:
//! - POST /admin/login - Open a session (sets the `admin_session` cookie)
//! - POST /admin/logout - End the session
//! - GET /admin/dashboard - Counts and recent audit entries
//! - GET /admin/licenses - List licenses
//! - POST /admin/licenses - Create a license
//! - POST /admin/licenses/{id}/revoke - Revoke a license
//! - GET /admin/devices - List devices with their license
//! - POST /admin/notifications - Notification stub
//!
//! Everything except login requires a valid session.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    middleware::auth::{clear_session_cookie_header, session_cookie_header},
    models::{
        admin_user::{AdminContext, LoginRequest, LoginResponse},
        audit_log::AuditLog,
        device::DeviceWithLicense,
        license::{CreateLicenseRequest, LicenseResponse, LicenseStatus},
    },
    services::{
        activation_service, admin_service, audit_service, license_service,
        notification_service::{self, NotificationRequest, NotificationResponse},
    },
};

/// Number of audit entries shown on the dashboard.
const RECENT_AUDIT_ENTRIES: i64 = 10;

/// Log in an admin.
///
/// # Request Body
///
/// ```json
/// {
///   "username": "admin",
///   "password": "..."
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: session details, plus `Set-Cookie: admin_session=...`
/// - **Error (401)**: unknown user, inactive user or wrong password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;

    let session = admin_service::login(
        &state.pool,
        &request.username,
        &request.password,
        state.admin_session_ttl,
    )
    .await?;

    let cookie = session_cookie_header(&session.token, state.admin_session_ttl.num_seconds());

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            username: session.username,
            session_token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

/// Log out the current admin and clear the cookie.
///
/// Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::logout(&state.pool, &admin).await?;

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie_header())],
    ))
}

/// Dashboard summary.
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub admin: String,
    pub licenses: LicenseCounts,
    pub devices: i64,
    pub recent_logs: Vec<AuditLog>,
    pub generated_at: DateTime<Utc>,
}

/// License counts by stored status.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LicenseCounts {
    pub active: i64,
    pub expired: i64,
    pub revoked: i64,
}

impl FromIterator<(LicenseStatus, i64)> for LicenseCounts {
    fn from_iter<I: IntoIterator<Item = (LicenseStatus, i64)>>(iter: I) -> Self {
        let mut counts = LicenseCounts::default();
        for (status, count) in iter {
            match status {
                LicenseStatus::Active => counts.active += count,
                LicenseStatus::Expired => counts.expired += count,
                LicenseStatus::Revoked => counts.revoked += count,
            }
        }
        counts
    }
}

/// Dashboard: license counts, device count and the latest audit entries.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
) -> Result<Json<DashboardResponse>, AppError> {
    let licenses: LicenseCounts = license_service::count_by_status(&state.pool)
        .await?
        .into_iter()
        .collect();
    let devices = activation_service::count_devices(&state.pool).await?;
    let recent_logs = audit_service::recent(&state.pool, RECENT_AUDIT_ENTRIES).await?;

    Ok(Json(DashboardResponse {
        admin: admin.username,
        licenses,
        devices,
        recent_logs,
        generated_at: Utc::now(),
    }))
}

/// List all licenses, newest first.
pub async fn list_licenses(
    State(state): State<AppState>,
) -> Result<Json<Vec<LicenseResponse>>, AppError> {
    let licenses = license_service::list_licenses(&state.pool).await?;

    Ok(Json(licenses.into_iter().map(Into::into).collect()))
}

/// Create a license.
///
/// # Request Body
///
/// ```json
/// {
///   "key": "KEY-A",
///   "duration_days": 7,     // optional, defaults to 7
///   "never_expires": false  // optional
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the new license
/// - **Error (400)**: empty key or negative duration
/// - **Error (409)**: key already exists
pub async fn create_license(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    payload: Result<Json<CreateLicenseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;

    let license =
        license_service::create_license(&state.pool, request, Some(admin.admin_user_id)).await?;

    Ok((StatusCode::CREATED, Json(LicenseResponse::from(license))))
}

/// Revoke a license.
///
/// Revoking an already revoked license succeeds without changing it.
///
/// # Response
///
/// - **Success (200 OK)**: the revoked license
/// - **Error (404)**: license not found
pub async fn revoke_license(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(license_id): Path<Uuid>,
) -> Result<Json<LicenseResponse>, AppError> {
    let license = license_service::revoke_license(
        &state.pool,
        license_id,
        Some(admin.admin_user_id),
        &admin.username,
    )
    .await?;

    Ok(Json(license.into()))
}

/// List all devices with their license key, newest first.
pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceWithLicense>>, AppError> {
    let devices = activation_service::list_devices(&state.pool).await?;

    Ok(Json(devices))
}

/// Accept a notification request. Nothing is sent.
pub async fn send_notification(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    payload: Result<Json<NotificationRequest>, JsonRejection>,
) -> Result<Json<NotificationResponse>, AppError> {
    let Json(request) = payload?;

    let response = notification_service::send_notification(&state.pool, &admin, request).await?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_fold_by_status() {
        let counts: LicenseCounts = vec![
            (LicenseStatus::Active, 3),
            (LicenseStatus::Revoked, 1),
        ]
        .into_iter()
        .collect();

        assert_eq!(counts.active, 3);
        assert_eq!(counts.expired, 0);
        assert_eq!(counts.revoked, 1);
    }
}

//! Activation service - device binding and token validation.
//!
//! This service handles:
//! - Binding a device to a license and issuing a token (`POST /activate`)
//! - Re-checking a token holder's license (`POST /validate`)
//!
//! # Atomicity Guarantees
//!
//! Each call runs in one PostgreSQL transaction. The license row is locked
//! with `FOR UPDATE`, and the unique index on `devices.device_id` decides
//! which of two concurrent first activations wins. Any early return drops
//! the transaction and rolls it back, except for license state failures,
//! which commit first so a lazy expiry is persisted.

use chrono::{DateTime, Utc};

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        audit_log::{ClientMeta, NewAuditEntry, actions},
        device::{
            ActivateRequest, ActivateResponse, Binding, Device, DeviceWithLicense, ValidateResponse,
        },
        license::License,
    },
    services::{
        audit_service, license_service,
        token_service::{DeviceClaims, TokenIssuer},
    },
};

/// Activation request after field validation.
#[derive(Debug, Clone)]
pub struct Activation {
    pub license_key: String,
    pub device_id: String,
    pub device_info: Option<String>,
}

impl TryFrom<ActivateRequest> for Activation {
    type Error = AppError;

    fn try_from(request: ActivateRequest) -> Result<Self, Self::Error> {
        let required = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        match (required(request.license_key), required(request.device_id)) {
            (Some(license_key), Some(device_id)) => Ok(Self {
                license_key,
                device_id,
                device_info: request.device_info,
            }),
            _ => Err(AppError::InvalidRequest(
                "Missing required fields".to_string(),
            )),
        }
    }
}

/// Activate a license for a device.
///
/// # Process
///
/// 1. Lock the license by key
/// 2. Check status and expiry (persisting a lazy expiry)
/// 3. Look up the device globally by its identifier
/// 4. Same license: reissue a token. Other license: conflict.
/// 5. New device: insert the binding and record `license_activated`
/// 6. Commit and issue a token
///
/// # Errors
///
/// - `LicenseNotFound`: unknown license key
/// - `LicenseInactive` / `LicenseExpired`: license cannot be used
/// - `DeviceConflict`: device identifier already bound to another license
/// - `Database`: storage failure (transaction rolled back)
pub async fn activate(
    pool: &DbPool,
    tokens: &TokenIssuer,
    activation: Activation,
    client: ClientMeta,
) -> Result<ActivateResponse, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let mut license = license_service::find_by_key_for_update(&mut tx, &activation.license_key)
        .await?
        .ok_or(AppError::LicenseNotFound)?;

    if let Err(err) = license_service::enforce_validity(&mut tx, &mut license, now, &client).await
    {
        return Err(finish_rejected(tx, err).await);
    }

    let device = bind_device(&mut tx, &license, &activation, now, client).await?;

    tx.commit().await?;

    let token = tokens.issue_at(&device.device_id, license.id, now);

    Ok(ActivateResponse {
        success: true,
        token,
        license_status: license.status,
        expires_at: license.expires_at,
    })
}

/// End a transaction whose license check failed.
///
/// State failures commit so that a lazy expiry sticks; anything else rolls back.
async fn finish_rejected(tx: DbTx<'_>, err: AppError) -> AppError {
    if !matches!(err, AppError::LicenseInactive(_) | AppError::LicenseExpired) {
        return err;
    }

    match tx.commit().await {
        Ok(()) => err,
        Err(commit_err) => commit_err.into(),
    }
}

/// Find or create the device binding for an activation.
async fn bind_device(
    tx: &mut DbTx<'_>,
    license: &License,
    activation: &Activation,
    now: DateTime<Utc>,
    client: ClientMeta,
) -> Result<Device, AppError> {
    if let Some(existing) = find_device_for_update(tx, &activation.device_id).await? {
        return reuse_binding(existing, license);
    }

    let inserted = sqlx::query_as::<_, Device>(
        r#"
        INSERT INTO devices (device_id, license_id, device_info, registered_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (device_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&activation.device_id)
    .bind(license.id)
    .bind(&activation.device_info)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(device) = inserted else {
        // A concurrent activation inserted this device after our lookup
        let existing = find_device_for_update(tx, &activation.device_id)
            .await?
            .ok_or(AppError::DeviceNotFound)?;
        return reuse_binding(existing, license);
    };

    audit_service::record(
        &mut **tx,
        NewAuditEntry::new(actions::LICENSE_ACTIVATED)
            .license(license.id)
            .device(device.id)
            .details(format!(
                "Device {} activated license {}",
                device.device_id, license.key
            ))
            .client(client),
    )
    .await?;

    tracing::info!(
        license_id = %license.id,
        device_id = %device.device_id,
        "device activated"
    );

    Ok(device)
}

fn reuse_binding(existing: Device, license: &License) -> Result<Device, AppError> {
    match existing.binding_for(license.id) {
        Binding::Existing => {
            tracing::debug!(device_id = %existing.device_id, "device already bound, reissuing token");
            Ok(existing)
        }
        Binding::Conflict => {
            tracing::warn!(
                device_id = %existing.device_id,
                bound_license_id = %existing.license_id,
                requested_license_id = %license.id,
                "device bound to a different license"
            );
            Err(AppError::DeviceConflict)
        }
    }
}

/// Device lookup is global, not scoped to a license.
async fn find_device_for_update(
    tx: &mut DbTx<'_>,
    device_id: &str,
) -> Result<Option<Device>, AppError> {
    let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE device_id = $1 FOR UPDATE")
        .bind(device_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(device)
}

/// Validate the license behind a verified device token.
///
/// # Process
///
/// 1. Resolve the device named by the token subject
/// 2. Lock its bound license
/// 3. Check status and expiry (persisting a lazy expiry)
/// 4. Stamp `last_validated`
///
/// Row locks are taken license first, then device, the same order as
/// [`activate`]. A device's license never changes, so the unlocked lookup
/// in step 1 is stable.
///
/// # Errors
///
/// - `DeviceNotFound`: no device with the token subject
/// - `LicenseNotFound`: the device's license row is missing (integrity violation)
/// - `LicenseInactive` / `LicenseExpired`: license cannot be used
pub async fn validate(
    pool: &DbPool,
    claims: &DeviceClaims,
    client: ClientMeta,
) -> Result<ValidateResponse, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE device_id = $1")
        .bind(&claims.sub)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::DeviceNotFound)?;

    let Some(mut license) = license_service::find_by_id_for_update(&mut tx, device.license_id).await?
    else {
        tracing::error!(
            device_id = %device.device_id,
            license_id = %device.license_id,
            "device references a missing license"
        );
        return Err(AppError::LicenseNotFound);
    };

    let days_remaining =
        match license_service::enforce_validity(&mut tx, &mut license, now, &client).await {
            Ok(days_remaining) => days_remaining,
            Err(err) => return Err(finish_rejected(tx, err).await),
        };

    sqlx::query("UPDATE devices SET last_validated = $1 WHERE id = $2")
        .bind(now)
        .bind(device.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(ValidateResponse {
        valid: true,
        license_status: license.status,
        expires_at: license.expires_at,
        days_remaining,
    })
}

/// Devices joined with their license, newest first.
pub async fn list_devices(pool: &DbPool) -> Result<Vec<DeviceWithLicense>, AppError> {
    let devices = sqlx::query_as::<_, DeviceWithLicense>(
        r#"
        SELECT
            d.id,
            d.device_id,
            d.device_info,
            d.registered_at,
            d.last_validated,
            d.is_active,
            l.id AS license_id,
            l.key AS license_key,
            l.status AS license_status
        FROM devices d
        JOIN licenses l ON l.id = d.license_id
        ORDER BY d.registered_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(devices)
}

/// Total number of registered devices.
pub async fn count_devices(pool: &DbPool) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(license_key: Option<&str>, device_id: Option<&str>) -> ActivateRequest {
        ActivateRequest {
            license_key: license_key.map(str::to_string),
            device_id: device_id.map(str::to_string),
            device_info: Some("Pixel 8".to_string()),
        }
    }

    #[test]
    fn complete_request_is_accepted() {
        let activation = Activation::try_from(request(Some("KEY-A"), Some("dev1"))).unwrap();
        assert_eq!(activation.license_key, "KEY-A");
        assert_eq!(activation.device_id, "dev1");
        assert_eq!(activation.device_info.as_deref(), Some("Pixel 8"));
    }

    #[test]
    fn missing_or_blank_fields_are_rejected() {
        for (key, device) in [
            (None, Some("dev1")),
            (Some("KEY-A"), None),
            (Some("  "), Some("dev1")),
            (Some("KEY-A"), Some("")),
        ] {
            assert!(matches!(
                Activation::try_from(request(key, device)),
                Err(AppError::InvalidRequest(_))
            ));
        }
    }
}

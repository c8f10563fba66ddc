//! License service - the license state machine backed by the database.
//!
//! This service handles:
//! - Creating licenses (admin)
//! - Revoking licenses (admin)
//! - Checking validity and persisting lazy expiry
//!
//! # Expiry Model
//!
//! There is no background sweep. A license whose `expires_at` has passed
//! keeps `status = 'active'` in the database until the next activation or
//! validation looks at it; that check writes `expired` and it never reverts.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        audit_log::{ClientMeta, NewAuditEntry, actions},
        license::{CreateLicenseRequest, License, LicenseStatus, Validity},
    },
    services::audit_service,
};

/// Fetch a license by key and lock its row for the rest of the transaction.
pub async fn find_by_key_for_update(
    tx: &mut DbTx<'_>,
    key: &str,
) -> Result<Option<License>, AppError> {
    let license =
        sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE key = $1 FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut **tx)
            .await?;

    Ok(license)
}

/// Fetch a license by id and lock its row for the rest of the transaction.
pub async fn find_by_id_for_update(
    tx: &mut DbTx<'_>,
    license_id: Uuid,
) -> Result<Option<License>, AppError> {
    let license = sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE id = $1 FOR UPDATE")
        .bind(license_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(license)
}

/// Check a license at `now`, persisting the `active → expired` transition.
///
/// # Returns
///
/// Days remaining on success (`None` when the license never expires).
///
/// # Errors
///
/// - `LicenseInactive`: status is already `expired` or `revoked`
/// - `LicenseExpired`: license expired just now (status has been updated in `tx`)
///
/// The caller should commit `tx` before returning either error so that the
/// expiry sticks.
pub async fn enforce_validity(
    tx: &mut DbTx<'_>,
    license: &mut License,
    now: DateTime<Utc>,
    client: &ClientMeta,
) -> Result<Option<i64>, AppError> {
    match license.check_validity(now) {
        Validity::Valid { days_remaining } => Ok(days_remaining),
        Validity::Inactive(status) => Err(AppError::LicenseInactive(status)),
        Validity::Expired => {
            sqlx::query("UPDATE licenses SET status = $1 WHERE id = $2")
                .bind(LicenseStatus::Expired)
                .bind(license.id)
                .execute(&mut **tx)
                .await?;
            license.status = LicenseStatus::Expired;

            audit_service::record(
                &mut **tx,
                NewAuditEntry::new(actions::LICENSE_EXPIRED)
                    .license(license.id)
                    .details(format!("License {} expired", license.key))
                    .client(client.clone()),
            )
            .await?;

            tracing::info!(license_id = %license.id, "license expired");
            Err(AppError::LicenseExpired)
        }
    }
}

/// Create a new active license.
///
/// # Validation
///
/// - Key must be non-empty (surrounding whitespace is trimmed)
/// - `duration_days` must not be negative; zero expires immediately
///
/// # Errors
///
/// - `InvalidRequest`: validation failed
/// - `DuplicateKey`: a license with this key already exists
pub async fn create_license(
    pool: &DbPool,
    request: CreateLicenseRequest,
    actor: Option<Uuid>,
) -> Result<License, AppError> {
    let key = request.key.trim();
    if key.is_empty() {
        return Err(AppError::InvalidRequest(
            "License key is required".to_string(),
        ));
    }
    let expires_at = expiry_for(request.duration_days, request.never_expires, Utc::now())?;

    let mut tx = pool.begin().await?;

    // The unique index decides races between two admins creating the same key
    let license = sqlx::query_as::<_, License>(
        r#"
        INSERT INTO licenses (key, status, expires_at, created_by)
        VALUES ($1, 'active', $2, $3)
        ON CONFLICT (key) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(key)
    .bind(expires_at)
    .bind(actor)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::DuplicateKey)?;

    audit_service::record(
        &mut *tx,
        NewAuditEntry::new(actions::LICENSE_CREATED)
            .license(license.id)
            .admin(actor)
            .details(format!("License {} created", license.key)),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(license_id = %license.id, expires_at = ?license.expires_at, "license created");
    Ok(license)
}

/// Compute the expiry instant for a new license.
pub fn expiry_for(
    duration_days: i64,
    never_expires: bool,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, AppError> {
    if never_expires {
        return Ok(None);
    }
    if duration_days < 0 {
        return Err(AppError::InvalidRequest(
            "Duration must not be negative".to_string(),
        ));
    }

    Duration::try_days(duration_days)
        .and_then(|duration| now.checked_add_signed(duration))
        .map(Some)
        .ok_or_else(|| AppError::InvalidRequest("Duration is too large".to_string()))
}

/// Revoke a license.
///
/// Revoking an already revoked license is a successful no-op: the original
/// revocation time and actor are kept and no audit entry is written.
///
/// # Errors
///
/// - `LicenseNotFound`: no license with this id
pub async fn revoke_license(
    pool: &DbPool,
    license_id: Uuid,
    actor: Option<Uuid>,
    actor_name: &str,
) -> Result<License, AppError> {
    let mut tx = pool.begin().await?;

    let license = find_by_id_for_update(&mut tx, license_id)
        .await?
        .ok_or(AppError::LicenseNotFound)?;

    if license.status == LicenseStatus::Revoked {
        tx.rollback().await?;
        return Ok(license);
    }

    let license = sqlx::query_as::<_, License>(
        r#"
        UPDATE licenses
        SET status = $1,
            revoked_at = NOW(),
            revoked_by = $2
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(LicenseStatus::Revoked)
    .bind(actor)
    .bind(license_id)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        NewAuditEntry::new(actions::LICENSE_REVOKED)
            .license(license.id)
            .admin(actor)
            .details(format!("License {} revoked by {}", license.key, actor_name)),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(license_id = %license.id, revoked_by = %actor_name, "license revoked");
    Ok(license)
}

/// All licenses, newest first.
pub async fn list_licenses(pool: &DbPool) -> Result<Vec<License>, AppError> {
    let licenses = sqlx::query_as::<_, License>("SELECT * FROM licenses ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    Ok(licenses)
}

/// Number of licenses per stored status.
///
/// Licenses past their expiry but not yet checked still count as active.
pub async fn count_by_status(pool: &DbPool) -> Result<Vec<(LicenseStatus, i64)>, AppError> {
    let counts = sqlx::query_as::<_, (LicenseStatus, i64)>(
        "SELECT status, COUNT(*) FROM licenses GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(counts)
}

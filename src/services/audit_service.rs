//! Audit recorder.
//!
//! Every license or device state change writes one row to `audit_logs`,
//! inside the same transaction as the change itself.

use sqlx::PgExecutor;

use crate::{
    db::DbPool,
    error::AppError,
    models::audit_log::{AuditLog, NewAuditEntry},
};

/// Append an audit entry.
///
/// Accepts a pool or an open transaction. Storage errors propagate so the
/// surrounding transaction rolls back with the change being audited.
pub async fn record<'e, E>(executor: E, entry: NewAuditEntry) -> Result<AuditLog, AppError>
where
    E: PgExecutor<'e>,
{
    let log = sqlx::query_as::<_, AuditLog>(
        r#"
        INSERT INTO audit_logs (
            action,
            details,
            ip_address,
            user_agent,
            license_id,
            device_id,
            admin_user_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(entry.action)
    .bind(entry.details)
    .bind(entry.client.ip_address)
    .bind(entry.client.user_agent)
    .bind(entry.license_id)
    .bind(entry.device_id)
    .bind(entry.admin_user_id)
    .fetch_one(executor)
    .await?;

    tracing::debug!(action = %log.action, audit_id = %log.id, "audit entry recorded");

    Ok(log)
}

/// Most recent entries, newest first.
pub async fn recent(pool: &DbPool, limit: i64) -> Result<Vec<AuditLog>, AppError> {
    let logs = sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM audit_logs ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

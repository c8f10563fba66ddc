//! Push notification stub.
//!
//! Requests are validated and recorded in the audit log, but nothing is
//! delivered. Devices carry a `push_token` column for the day a provider is
//! wired in.

use serde::{Deserialize, Serialize};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        admin_user::AdminContext,
        audit_log::{NewAuditEntry, actions},
    },
    services::audit_service,
};

/// Who a notification is addressed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTarget {
    #[default]
    All,
    SpecificLicense,
    SpecificDevice,
}

/// Request body for `POST /admin/notifications`.
#[derive(Debug, Deserialize, Serialize)]
pub struct NotificationRequest {
    pub title: String,
    pub message: String,

    #[serde(default)]
    pub target: NotificationTarget,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub success: bool,
}

/// Accept a notification request without sending anything.
pub async fn send_notification(
    pool: &DbPool,
    admin: &AdminContext,
    request: NotificationRequest,
) -> Result<NotificationResponse, AppError> {
    if request.title.trim().is_empty() || request.message.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Title and message are required".to_string(),
        ));
    }

    audit_service::record(
        pool,
        NewAuditEntry::new(actions::NOTIFICATION_REQUESTED)
            .admin(Some(admin.admin_user_id))
            .details(format!("{:?}: {}", request.target, request.title)),
    )
    .await?;

    tracing::info!(
        target_group = ?request.target,
        title = %request.title,
        "notification requested (delivery not implemented)"
    );

    Ok(NotificationResponse { success: true })
}

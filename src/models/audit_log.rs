//! Audit log model.
//!
//! Audit entries are append-only: there is no update or delete path.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Action codes written by the application.
pub mod actions {
    pub const LICENSE_CREATED: &str = "license_created";
    pub const LICENSE_ACTIVATED: &str = "license_activated";
    pub const LICENSE_EXPIRED: &str = "license_expired";
    pub const LICENSE_REVOKED: &str = "license_revoked";
    pub const NOTIFICATION_REQUESTED: &str = "notification_requested";
}

/// Audit log entry as stored.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub license_id: Option<Uuid>,
    /// References `devices.id`, not the client-chosen identifier
    pub device_id: Option<Uuid>,
    pub admin_user_id: Option<Uuid>,
}

/// Network metadata about the caller, attached to audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    /// Read the client address from `X-Forwarded-For` (first hop) or
    /// `X-Real-IP`, and the `User-Agent` header.
    ///
    /// Both address headers are taken as sent. Deploy behind a trusted
    /// reverse proxy that overwrites them, otherwise a client can put any
    /// address into the audit log.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = header(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| header(headers, "x-real-ip"))
            // Column is sized for IPv6 text form
            .map(|ip| ip.chars().take(45).collect());

        Self {
            ip_address,
            user_agent: header(headers, "user-agent").map(str::to_string),
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Audit entry waiting to be inserted.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: &'static str,
    pub details: Option<String>,
    pub license_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub admin_user_id: Option<Uuid>,
    pub client: ClientMeta,
}

impl NewAuditEntry {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            details: None,
            license_id: None,
            device_id: None,
            admin_user_id: None,
            client: ClientMeta::default(),
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn license(mut self, license_id: Uuid) -> Self {
        self.license_id = Some(license_id);
        self
    }

    pub fn device(mut self, device_id: Uuid) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn admin(mut self, admin_user_id: Option<Uuid>) -> Self {
        self.admin_user_id = admin_user_id;
        self
    }

    pub fn client(mut self, client: ClientMeta) -> Self {
        self.client = client;
        self
    }
}

//! Device data models and the device-binding decision.
//!
//! A device is identified by a caller-supplied string. The identifier is
//! unique across the whole system, not per license, so two customers picking
//! the same identifier will collide.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::license::LicenseStatus;

/// Represents a device record from the database.
///
/// # Database Table
///
/// Maps to the `devices` table. Every device belongs to exactly one license.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Device {
    /// Row identifier (referenced by audit entries)
    pub id: Uuid,

    /// Identifier chosen by the client application
    pub device_id: String,

    pub license_id: Uuid,

    /// Free-text description sent on activation
    pub device_info: Option<String>,

    /// Push-notification token (unused until notifications are implemented)
    pub push_token: Option<String>,

    pub registered_at: DateTime<Utc>,

    pub last_validated: Option<DateTime<Utc>>,

    pub is_active: bool,
}

/// What to do with an activation request given the device row already on file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Same device, same license: reissue a token, write nothing.
    Existing,

    /// Device belongs to another license.
    Conflict,
}

impl Device {
    /// First activation wins: a device is only ever re-bound to its own license.
    pub fn binding_for(&self, license_id: Uuid) -> Binding {
        if self.license_id == license_id {
            Binding::Existing
        } else {
            Binding::Conflict
        }
    }
}

/// Request body for `POST /activate`.
///
/// Fields are optional so that missing values produce a 400 with a clear
/// message instead of a deserialization rejection.
///
/// # JSON Example
///
/// ```json
/// {
///   "license_key": "KEY-A",
///   "device_id": "dev1",
///   "device_info": "Pixel 8, Android 15"
/// }
/// ```
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ActivateRequest {
    pub license_key: Option<String>,
    pub device_id: Option<String>,
    pub device_info: Option<String>,
}

/// Response body for a successful activation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivateResponse {
    pub success: bool,
    pub token: String,
    pub license_status: LicenseStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response body for a successful validation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub license_status: LicenseStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<i64>,
}

/// Device joined with its license key, for the admin device list.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct DeviceWithLicense {
    pub id: Uuid,
    pub device_id: String,
    pub device_info: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_validated: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub license_id: Uuid,
    pub license_key: String,
    pub license_status: LicenseStatus,
}

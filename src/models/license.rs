//! License data models and the license validity rules.
//!
//! This module defines:
//! - `License`: Database entity representing a license key
//! - `LicenseStatus`: The three states a license moves through
//! - `Validity`: Result of checking a license at a point in time
//! - Request/response types for the admin license endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// License lifecycle state.
///
/// Transitions are one-directional: `active → expired` happens lazily when a
/// check finds the license past its expiry, `active → revoked` (or
/// `expired → revoked`) happens on admin revocation. Nothing ever returns
/// to `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "license_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a license record from the database.
///
/// # Database Table
///
/// Maps to the `licenses` table. Licenses are never deleted so that audit
/// entries keep pointing at something.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct License {
    pub id: Uuid,

    /// The opaque key handed to customers (unique)
    pub key: String,

    pub status: LicenseStatus,

    /// `None` means the license never expires
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub revoked_at: Option<DateTime<Utc>>,

    /// Admin who created the license
    pub created_by: Option<Uuid>,

    /// Admin who revoked the license
    pub revoked_by: Option<Uuid>,
}

/// Outcome of checking a license at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Usable. `days_remaining` is `None` for licenses without expiry.
    Valid { days_remaining: Option<i64> },

    /// Status is already terminal (`expired` or `revoked`).
    Inactive(LicenseStatus),

    /// Status is still `active` but the expiry instant has passed.
    /// The caller must persist the transition to `expired`.
    Expired,
}

impl License {
    /// Whether the expiry instant lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }

    /// Whole days left until expiry, truncated. Never negative.
    pub fn days_remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at
            .map(|expires_at| (expires_at - now).num_days().max(0))
    }

    /// Evaluate the license at `now` without touching storage.
    pub fn check_validity(&self, now: DateTime<Utc>) -> Validity {
        if self.status != LicenseStatus::Active {
            return Validity::Inactive(self.status);
        }

        if self.is_expired_at(now) {
            return Validity::Expired;
        }

        Validity::Valid {
            days_remaining: self.days_remaining_at(now),
        }
    }
}

/// Request body for creating a license.
///
/// # JSON Example
///
/// ```json
/// {
///   "key": "KEY-A",
///   "duration_days": 7
/// }
/// ```
///
/// # Validation
///
/// - `key`: Required, non-empty
/// - `duration_days`: Optional, defaults to 7. Zero expires immediately, negative is rejected
/// - `never_expires`: Optional, defaults to false. When true `duration_days` is ignored
#[derive(Debug, Deserialize)]
pub struct CreateLicenseRequest {
    pub key: String,

    #[serde(default = "default_duration_days")]
    pub duration_days: i64,

    #[serde(default)]
    pub never_expires: bool,
}

fn default_duration_days() -> i64 {
    7
}

/// Response body for admin license endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseResponse {
    pub id: Uuid,
    pub key: String,
    pub status: LicenseStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<License> for LicenseResponse {
    fn from(license: License) -> Self {
        Self {
            days_remaining: license.days_remaining_at(Utc::now()),
            id: license.id,
            key: license.key,
            status: license.status,
            expires_at: license.expires_at,
            created_at: license.created_at,
            revoked_at: license.revoked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn license(status: LicenseStatus, expires_at: Option<DateTime<Utc>>) -> License {
        License {
            id: Uuid::new_v4(),
            key: "KEY-A".to_string(),
            status,
            expires_at,
            created_at: Utc::now(),
            revoked_at: None,
            created_by: None,
            revoked_by: None,
        }
    }

    #[test]
    fn active_license_reports_whole_days_remaining() {
        let now = Utc::now();
        let lic = license(
            LicenseStatus::Active,
            Some(now + Duration::days(7) - Duration::hours(1)),
        );

        assert_eq!(
            lic.check_validity(now),
            Validity::Valid {
                days_remaining: Some(6)
            }
        );
    }

    #[test]
    fn license_without_expiry_is_unbounded() {
        let lic = license(LicenseStatus::Active, None);
        assert_eq!(
            lic.check_validity(Utc::now()),
            Validity::Valid {
                days_remaining: None
            }
        );
    }

    #[test]
    fn past_expiry_is_detected_on_check() {
        let now = Utc::now();
        let lic = license(LicenseStatus::Active, Some(now - Duration::seconds(1)));

        assert!(lic.is_expired_at(now));
        assert_eq!(lic.check_validity(now), Validity::Expired);
    }

    #[test]
    fn expiry_instant_itself_is_still_valid() {
        let now = Utc::now();
        let lic = license(LicenseStatus::Active, Some(now));

        assert_eq!(
            lic.check_validity(now),
            Validity::Valid {
                days_remaining: Some(0)
            }
        );
        assert_eq!(
            lic.check_validity(now + Duration::milliseconds(1)),
            Validity::Expired
        );
    }

    #[test]
    fn terminal_statuses_report_current_status() {
        let future = Some(Utc::now() + Duration::days(30));

        assert_eq!(
            license(LicenseStatus::Revoked, future).check_validity(Utc::now()),
            Validity::Inactive(LicenseStatus::Revoked)
        );
        assert_eq!(
            license(LicenseStatus::Expired, future).check_validity(Utc::now()),
            Validity::Inactive(LicenseStatus::Expired)
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(LicenseStatus::Revoked).unwrap(),
            serde_json::json!("revoked")
        );
        assert_eq!(LicenseStatus::Active.to_string(), "active");
    }

    #[test]
    fn create_request_defaults_to_seven_days() {
        let request: CreateLicenseRequest =
            serde_json::from_str(r#"{"key": "KEY-A"}"#).unwrap();

        assert_eq!(request.duration_days, 7);
        assert!(!request.never_expires);
    }
}

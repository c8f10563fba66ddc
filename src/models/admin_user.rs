//! Admin user model and session types.
//!
//! Admins log in with a username and password and receive an opaque session
//! secret. Only its SHA-256 hash is stored, the same way the secret would be
//! checked if it were sent as a bearer token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an admin user record from the database.
///
/// # Database Table
///
/// Maps to the `admin_users` table. `password_hash` is an Argon2 PHC string
/// and carries its own salt.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Authenticated admin attached to requests by the session middleware.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub admin_user_id: Uuid,
    pub username: String,

    /// SHA-256 of the session secret, used to end the session on logout
    pub session_hash: String,
}

/// Request body for `POST /admin/login`.
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response body for a successful login.
///
/// The session secret is also set as the `admin_session` cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Newly created session, before it is handed to the client.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

//! Admin accounts and server-side sessions.
//!
//! Passwords are hashed with Argon2id. A login hands out a random session
//! secret; the database only keeps its SHA-256 hash, so a leaked
//! `admin_sessions` table cannot be replayed.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::admin_user::{AdminContext, AdminSession, AdminUser},
};

/// Hash a password into an Argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("salt encoding failed: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// SHA-256 hex digest of a session secret.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random session secret (64 hex characters).
fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Create an admin account.
pub async fn create_admin(
    pool: &DbPool,
    username: &str,
    email: &str,
    password: &str,
) -> Result<AdminUser, AppError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::InvalidRequest(
            "Username and password are required".to_string(),
        ));
    }
    let password_hash = hash_password(password)?;

    let admin = sqlx::query_as::<_, AdminUser>(
        r#"
        INSERT INTO admin_users (username, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(username.trim())
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(admin)
}

/// Create the first admin account when none exists yet.
///
/// Returns `true` if an account was created.
pub async fn ensure_bootstrap_admin(
    pool: &DbPool,
    username: &str,
    email: &str,
    password: &str,
) -> Result<bool, AppError> {
    let has_admin: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admin_users)")
        .fetch_one(pool)
        .await?;

    if has_admin {
        return Ok(false);
    }

    let admin = create_admin(pool, username, email, password).await?;
    tracing::info!(username = %admin.username, "bootstrap admin user created");

    Ok(true)
}

/// Check credentials and open a session.
///
/// # Errors
///
/// - `InvalidCredentials`: unknown user, inactive user, or wrong password
pub async fn login(
    pool: &DbPool,
    username: &str,
    password: &str,
    ttl: Duration,
) -> Result<AdminSession, AppError> {
    let admin = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    let admin = match admin {
        Some(admin) if admin.is_active && verify_password(password, &admin.password_hash) => admin,
        _ => {
            tracing::warn!(username = %username, "admin login failed");
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = generate_session_token();
    let expires_at = Utc::now() + ttl;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO admin_sessions (admin_user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(admin.id)
    .bind(hash_session_token(&token))
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE admin_users SET last_login = NOW() WHERE id = $1")
        .bind(admin.id)
        .execute(&mut *tx)
        .await?;

    // Opportunistic cleanup of this admin's stale sessions
    sqlx::query("DELETE FROM admin_sessions WHERE admin_user_id = $1 AND expires_at < NOW()")
        .bind(admin.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(username = %admin.username, "admin logged in");

    Ok(AdminSession {
        username: admin.username,
        token,
        expires_at,
    })
}

/// Resolve a session secret to the admin it belongs to.
///
/// Expired sessions and deactivated admins are rejected.
pub async fn authenticate_session(pool: &DbPool, token: &str) -> Result<AdminContext, AppError> {
    let session_hash = hash_session_token(token);

    let (admin_user_id, username): (Uuid, String) = sqlx::query_as(
        r#"
        SELECT u.id, u.username
        FROM admin_sessions s
        JOIN admin_users u ON u.id = s.admin_user_id
        WHERE s.token_hash = $1
          AND s.expires_at > NOW()
          AND u.is_active = true
        "#,
    )
    .bind(&session_hash)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::AdminUnauthenticated)?;

    Ok(AdminContext {
        admin_user_id,
        username,
        session_hash,
    })
}

/// End a session.
pub async fn logout(pool: &DbPool, admin: &AdminContext) -> Result<(), AppError> {
    sqlx::query("DELETE FROM admin_sessions WHERE token_hash = $1")
        .bind(&admin.session_hash)
        .execute(pool)
        .await?;

    tracing::info!(username = %admin.username, "admin logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("admin123").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("admin123", &hash));
        assert!(!verify_password("admin124", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("admin123").unwrap(), hash_password("admin123").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password("admin123", "not-a-phc-string"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn session_hash_is_stable_sha256_hex() {
        let hash = hash_session_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_session_token("abc"));
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn session_tokens_are_random() {
        assert_ne!(generate_session_token(), generate_session_token());
    }
}

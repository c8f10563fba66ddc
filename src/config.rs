//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use chrono::Duration;
use serde::Deserialize;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{name} must be a positive number of hours, got {hours}")]
    InvalidHours { name: &'static str, hours: i64 },
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `JWT_SECRET` (optional): signing secret for device tokens. A random one
///   is generated at startup when missing, so tokens do not survive restarts.
/// - `TOKEN_TTL_HOURS` (optional): device token lifetime, defaults to 24
/// - `ADMIN_SESSION_TTL_HOURS` (optional): admin session lifetime, defaults to 12
/// - `ADMIN_USERNAME`, `ADMIN_PASSWORD`, `ADMIN_EMAIL` (optional): first admin
///   account, created only while the `admin_users` table is empty
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    #[serde(default = "default_admin_session_ttl_hours")]
    pub admin_session_ttl_hours: i64,

    #[serde(default)]
    pub admin_username: Option<String>,

    #[serde(default)]
    pub admin_password: Option<String>,

    #[serde(default)]
    pub admin_email: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

/// Device tokens are valid for one day unless configured otherwise.
fn default_token_ttl_hours() -> i64 {
    24
}

fn default_admin_session_ttl_hours() -> i64 {
    12
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - A lifetime in hours is zero, negative or out of range
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject lifetimes that would produce dead tokens or sessions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.token_ttl()?;
        self.admin_session_ttl()?;
        Ok(())
    }

    /// Device token lifetime.
    pub fn token_ttl(&self) -> Result<Duration, ConfigError> {
        positive_hours("TOKEN_TTL_HOURS", self.token_ttl_hours)
    }

    /// Admin session lifetime.
    pub fn admin_session_ttl(&self) -> Result<Duration, ConfigError> {
        positive_hours("ADMIN_SESSION_TTL_HOURS", self.admin_session_ttl_hours)
    }

    /// Bootstrap admin credentials, if both username and password are configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str, String)> {
        let username = self.admin_username.as_deref()?;
        let password = self.admin_password.as_deref()?;
        let email = self
            .admin_email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost", username));

        Some((username, password, email))
    }
}

fn positive_hours(name: &'static str, hours: i64) -> Result<Duration, ConfigError> {
    match Duration::try_hours(hours) {
        Some(duration) if hours > 0 => Ok(duration),
        _ => Err(ConfigError::InvalidHours { name, hours }),
    }
}

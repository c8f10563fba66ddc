//! License Key Server - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Create the bootstrap admin if configured and none exists
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

use std::sync::Arc;

use license_key_server::{
    AppState, build_router, config, db, services::admin_service,
    services::token_service::TokenIssuer,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    if let Some((username, password, email)) = config.bootstrap_admin() {
        admin_service::ensure_bootstrap_admin(&pool, username, &email, password).await?;
    }

    let secret = match config.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!("JWT_SECRET not set, using a random secret; tokens will not survive a restart");
            TokenIssuer::generate_secret()
        }
    };
    let tokens = TokenIssuer::new(secret.as_bytes(), config.token_ttl()?)
        .map_err(|_| anyhow::anyhow!("JWT_SECRET must not be empty"))?;

    let state = AppState {
        pool,
        tokens: Arc::new(tokens),
        admin_session_ttl: config.admin_session_ttl()?,
    };

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

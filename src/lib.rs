//! License Key Server
//!
//! Issues, validates and revokes software license keys bound to devices,
//! with an administrative API for lifecycle management.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries, row locking)
//! - **Device authentication**: HS256 tokens signed with HMAC-SHA256
//! - **Admin authentication**: Argon2 passwords, server-side sessions in a cookie
//! - **Format**: JSON requests/responses

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{db::DbPool, services::token_service::TokenIssuer};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: DbPool,

    /// Read-only after startup
    pub tokens: Arc<TokenIssuer>,

    pub admin_session_ttl: chrono::Duration,
}

/// Build the HTTP router with all routes and middleware.
///
/// # Routes
///
/// - Public: `GET /health`, `POST /activate`, `POST /admin/login`
/// - Device token: `POST /validate`
/// - Admin session: everything else under `/admin`
pub fn build_router(state: AppState) -> Router {
    let device_routes = Router::new()
        .route("/validate", post(handlers::licensing::validate))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::device_token_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/logout", post(handlers::admin::logout))
        .route("/admin/dashboard", get(handlers::admin::dashboard))
        .route(
            "/admin/licenses",
            get(handlers::admin::list_licenses).post(handlers::admin::create_license),
        )
        .route(
            "/admin/licenses/{id}/revoke",
            post(handlers::admin::revoke_license),
        )
        .route("/admin/devices", get(handlers::admin::list_devices))
        .route(
            "/admin/notifications",
            post(handlers::admin::send_notification),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_session_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/activate", post(handlers::licensing::activate))
        .route("/admin/login", post(handlers::admin::login))
        .merge(device_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Client applications call /activate and /validate from anywhere
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

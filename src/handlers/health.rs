//! Health check endpoint for load balancers and uptime probes.

use crate::{AppState, error::AppError};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: DatabaseHealth,
    pub timestamp: DateTime<Utc>,
}

/// Connection pool snapshot taken after the probe query.
#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: usize,
}

/// `GET /health`
///
/// Runs `SELECT 1` through the pool. An unreachable database surfaces as
/// the standard 500 error body.
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": { "connected": true, "pool_size": 2, "idle_connections": 1 },
///   "timestamp": "2026-10-17T19:00:00Z"
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            connected: true,
            pool_size: state.pool.size(),
            idle_connections: state.pool.num_idle(),
        },
        timestamp: Utc::now(),
    }))
}

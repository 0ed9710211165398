//! Site endpoints
//!
//! - GET / - Placeholder greeting for the bare backend
//! - GET /api/v1/health - Database ping and request statistics

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AppState;
use crate::config::DatabaseDriver;

pub const GREETING: &str = "Hello from Last Little Haven backend";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseDriver,
    pub database_ok: bool,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
}

/// Root routes, outside the API prefix
pub fn root_router() -> Router<AppState> {
    Router::new().route("/", get(greeting))
}

/// Build the health router (mounted under the API prefix)
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn greeting() -> &'static str {
    GREETING
}

/// GET /api/v1/health
///
/// Answers 503 when the database does not respond.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            false
        }
    };

    let stats = &state.request_stats;
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database_ok { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: state.pool.driver(),
            database_ok,
            uptime_seconds: stats.uptime_seconds(),
            total_requests: stats.total_requests(),
            avg_response_time_ms: (stats.avg_response_time_us() / 10.0).round() / 100.0,
        }),
    )
}

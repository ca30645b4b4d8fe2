//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub rate_limit: RateLimitHealth,
}

#[derive(Serialize)]
pub struct RateLimitHealth {
    /// Distributed store state: disabled, pending, connected, unavailable or closed.
    pub store: &'static str,
    pub consecutive_failures: u32,
    pub local_windows: usize,
}

/// Health check endpoint - returns server status.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let limiter = &state.limiter;
    let response = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        rate_limit: RateLimitHealth {
            store: limiter.distributed_state().as_str(),
            consecutive_failures: limiter.health().consecutive_failures(),
            local_windows: limiter.local_store().len(),
        },
    };

    HttpResponse::Ok().json(response)
}

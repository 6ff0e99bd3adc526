pub mod admin;
pub mod radio;

use axum::Json;
use serde::Serialize;

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `{"status": ...}` acknowledgement
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{
    errors::ApiError,
    handlers::common::{map_service_error, success_response},
    AppState,
};

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub environment: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub coupons: usize,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness probe; also reports how many coupons the directory holds.
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let coupons = state.coupons.count().await.map_err(map_service_error)?;

    Ok(success_response(HealthResponse {
        status: ComponentStatus::Up,
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: get_uptime_secs(),
        coupons,
    }))
}

//! Health check handler

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use fleetcore_common::context::TenantContext;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

impl HealthResponse {
    fn healthy() -> Self {
        Self {
            status: "ok",
            database: "ok",
        }
    }

    fn unhealthy() -> Self {
        Self {
            status: "unhealthy",
            database: "unreachable",
        }
    }
}

/// Ping the pool under the health timeout; 503 when it cannot be reached
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let timeout = state.config.health_timeout();
    let ctx = TenantContext::background().with_timeout(timeout);
    let start = std::time::Instant::now();

    match tokio::time::timeout(timeout, state.pool.ping(&ctx)).await {
        Ok(Ok(())) => {
            tracing::debug!(latency_ms = start.elapsed().as_millis() as u64, "Health check ok");
            (StatusCode::OK, Json(HealthResponse::healthy()))
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::unhealthy()))
        }
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Health check timed out");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::unhealthy()))
        }
    }
}

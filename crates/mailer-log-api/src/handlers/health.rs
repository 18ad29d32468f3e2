//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;

use crate::auth::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
}

/// Detailed health response with component checks
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailedHealthResponse {
    /// healthy, degraded (webhooks rejected) or unhealthy (store unreachable)
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthChecks {
    /// Email store reachability
    pub database: ComponentHealth,
    /// Whether webhook signatures can be verified
    pub webhook_signing: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn new(status: &str, latency_ms: Option<u64>, error: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            latency_ms,
            error,
        }
    }

    fn is(&self, status: &str) -> bool {
        self.status == status
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is serving requests", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready once the email store answers
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Email store reachable"),
        (status = 503, description = "Email store unreachable")
    )
)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.emails.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "health",
    responses((status = 200, description = "Per-component status", body = DetailedHealthResponse))
)]
pub async fn health_detailed(State(state): State<Arc<AppState>>) -> Json<DetailedHealthResponse> {
    let started = Instant::now();
    let database = match state.emails.health_check().await {
        Ok(()) => ComponentHealth::new(
            "healthy",
            Some(started.elapsed().as_millis() as u64),
            None,
        ),
        Err(e) => ComponentHealth::new("unhealthy", None, Some(e.to_string())),
    };

    // Without a signing key every webhook is rejected
    let webhook_signing = if state.ingestor.signing_configured() {
        ComponentHealth::new("configured", None, None)
    } else {
        ComponentHealth::new(
            "missing",
            None,
            Some("webhook signing key not configured".to_string()),
        )
    };

    let status = if !database.is("healthy") {
        "unhealthy"
    } else if webhook_signing.is("configured") {
        "healthy"
    } else {
        "degraded"
    };

    Json(DetailedHealthResponse {
        status: status.to_string(),
        checks: HealthChecks {
            database,
            webhook_signing,
        },
    })
}

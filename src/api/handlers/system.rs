//! System endpoints: health check, replication status, notification log.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::service::NotificationRecord;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Replication status payload.
#[derive(Debug, Serialize, ToSchema)]
struct ReplicationResponse {
    /// Whether the failover circuit is currently open (mirror serving).
    circuit_open: bool,
    /// When the last background reconciliation finished.
    last_sync_at: Option<DateTime<Utc>>,
    /// Rows copied by the last reconciliation.
    last_sync_copied: Option<u64>,
    /// Rows skipped by the last reconciliation.
    last_sync_failed: Option<u64>,
    /// Error text when the last reconciliation could not complete.
    last_sync_error: Option<String>,
}

/// `GET /system/replication` — Circuit and reconciliation status.
#[utoipa::path(
    get,
    path = "/system/replication",
    tag = "System",
    summary = "Replication status",
    description = "Reports whether the failover circuit is open and the outcome of the most recent background reconciliation.",
    responses(
        (status = 200, description = "Replication status", body = ReplicationResponse),
    )
)]
pub async fn replication_handler(State(state): State<AppState>) -> impl IntoResponse {
    let last = state.sync_status.get();
    Json(ReplicationResponse {
        circuit_open: state.router.circuit_open(),
        last_sync_at: last.as_ref().map(|s| s.finished_at),
        last_sync_copied: last.as_ref().map(|s| s.copied),
        last_sync_failed: last.as_ref().map(|s| s.failed),
        last_sync_error: last.and_then(|s| s.error),
    })
}

/// `GET /system/notifications` — Recent notification outcomes.
#[utoipa::path(
    get,
    path = "/system/notifications",
    tag = "System",
    summary = "Notification log tail",
    description = "Returns the most recent email notification attempts and their outcomes.",
    responses(
        (status = 200, description = "Recent notification records", body = Vec<NotificationRecord>),
    )
)]
pub async fn notifications_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.notifications.recent())
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/system/replication", get(replication_handler))
        .route("/system/notifications", get(notifications_handler))
}

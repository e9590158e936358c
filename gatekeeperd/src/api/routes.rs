use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use shared::mac::MacAddress;
use shared::protocol::{HEALTH_PATH, REQUEST_PORT_PATH};
use shared::types::{HealthResponse, HealthStatus, PortResponse};
use crate::api::error::ApiError;
use crate::assignment::AssignmentHandle;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub assignments: AssignmentHandle,
    pub registry: Arc<dyn Registry>,
    /// Last known registry reachability; seeded by the startup check
    pub registry_ready: Arc<AtomicBool>,
}

#[derive(Deserialize)]
pub struct PortQuery {
    pub mac: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(REQUEST_PORT_PATH, get(request_port))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match state.registry.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Registry health check failed: {}", e);
            false
        }
    };
    state.registry_ready.store(connected, Ordering::SeqCst);

    Json(HealthResponse {
        status: if connected { HealthStatus::Healthy } else { HealthStatus::Degraded },
        registry_connected: connected,
        timestamp: Utc::now(),
    })
}

async fn request_port(
    State(state): State<AppState>,
    Query(params): Query<PortQuery>,
) -> Result<Json<PortResponse>, ApiError> {
    let raw = params.mac.ok_or(ApiError::MissingMac)?;
    let mac = MacAddress::normalize(&raw)?;

    tracing::info!("Port request for MAC: {}", mac);

    ensure_registry(&state).await?;

    let assignment = state.assignments.assign(mac).await?;
    Ok(Json(PortResponse {
        mac: assignment.mac,
        port: assignment.port,
        existing: assignment.existing,
        device_name: assignment.device_name,
        timestamp: Utc::now(),
    }))
}

/// 503 until the registry has answered at least once since it was last seen down.
async fn ensure_registry(state: &AppState) -> Result<(), ApiError> {
    if state.registry_ready.load(Ordering::SeqCst) {
        return Ok(());
    }

    match state.registry.ping().await {
        Ok(()) => {
            tracing::info!("Registry reachable again");
            state.registry_ready.store(true, Ordering::SeqCst);
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Registry still unreachable: {}", e);
            Err(ApiError::RegistryUnavailable)
        }
    }
}

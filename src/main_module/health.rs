//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::core::session::AuthPhase;
use crate::core::shared::state::AppState;

/// Always 200: an unconfigured backend is a setup state, not an outage.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let (configured, session) = match &state.backend {
        Some(backend) => (true, Some(backend.session.phase().await)),
        None => (false, None),
    };
    let pending = match &state.backend {
        Some(backend) => backend.crm.pending_count().await,
        None => 0,
    };

    let status = match session {
        None => "unconfigured",
        Some(AuthPhase::Checking) => "starting",
        Some(_) => "ok",
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": status,
            "service": "northlead",
            "version": env!("CARGO_PKG_VERSION"),
            "backend_configured": configured,
            "session": session,
            "pending_lead_updates": pending,
        })),
    )
}

pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "northlead",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

//! Liveness and health endpoints

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::shared_state::AppState;

pub const SERVICE_NAME: &str = "AI Wellness Companion API";

pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "rate_limiting": "enabled",
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match state.ctx.conversations.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!("Health check store ping failed: {:#}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": if database == "connected" { "ok" } else { "degraded" },
        "database": database,
        "ai_service": "configured",
        "rate_limiting": "active",
    }))
}

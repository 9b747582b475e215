// src/handlers/health.rs

use axum::Json;
use serde_json::{json, Value};

/// Liveness endpoint, outside the API key gate.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

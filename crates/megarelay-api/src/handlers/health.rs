use axum::Json;
use serde_json::{json, Value};

/// Liveness probe confirming the relay is up.
pub async fn index() -> Json<Value> {
    Json(json!({ "message": "MEGA relay backend is operational" }))
}

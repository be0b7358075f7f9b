use axum::response::Json;
use serde_json::{Value, json};

/// Liveness check for `/health` and `/up`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

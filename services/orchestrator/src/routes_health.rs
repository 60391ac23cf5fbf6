use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::types::Health;

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "GRN Inference API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/api/datasets", "/api/jobs", "/api/results", "/health"],
    }))
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "healthy", timestamp: Utc::now() })
}

use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::app::errors::ApiError;

pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Paint ERP API is running",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

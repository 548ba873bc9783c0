//! Health check handler

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::utils::human_format::format_bytes;
use crate::web::AppState;

/// Health check endpoint
///
/// Reports uptime, cache usage, heavy worker state and admission headroom.
/// Status is `degraded` when the cache directory cannot be scanned.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let service = &state.render_service;
    let now = Utc::now();
    let uptime = (now - state.started_at).to_std().unwrap_or_default();

    let (status, cache) = match service.cache().stats().await {
        Ok(stats) => (
            "healthy",
            json!({
                "directory": stats.directory,
                "entries": stats.entries,
                "bytes_used": stats.bytes_used,
                "quota_bytes": stats.quota_bytes,
                "usage": format!(
                    "{} / {}",
                    format_bytes(stats.bytes_used),
                    format_bytes(stats.quota_bytes)
                ),
            }),
        ),
        Err(e) => {
            warn!("Failed to read cache stats: {}", e);
            ("degraded", json!({ "error": e.to_string() }))
        }
    };

    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": now,
        "uptime_seconds": uptime.as_secs(),
        "cache": cache,
        "scheduler": service.scheduler().stats(),
        "admission": {
            "max_connections": service.max_connections(),
            "available": service.available_permits(),
        },
    }))
}

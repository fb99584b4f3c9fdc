use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and cache backend state.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let cache = if state.orchestrator.cache_degraded() {
        "degraded"
    } else {
        "ok"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "scout",
        "cache": cache
    }))
}

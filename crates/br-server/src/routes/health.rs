//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::context::AppContext;

/// GET /health -- liveness plus cache occupancy.
pub async fn health(State(ctx): State<AppContext>) -> Json<Value> {
    let cache = ctx.player.cache().map(|cache| {
        json!({
            "entries": cache.len(),
            "total_cost": cache.total_cost(),
        })
    });

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": cache,
        "background_tasks": ctx.player.pool().pending(),
    }))
}

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Health check endpoint
///
/// Reports store connectivity, whether the file root is present, and the
/// crate version. Used by load balancers and monitoring systems.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.clone();
    let files_root = state.sandbox.root().to_path_buf();

    let (db_status, files_status) = tokio::task::spawn_blocking(move || {
        let db_status = match store.ping() {
            Ok(()) => "connected",
            Err(e) => {
                tracing::error!("Database health check failed: {:?}", e);
                "disconnected"
            }
        };
        let files_status = if files_root.is_dir() { "available" } else { "missing" };
        (db_status, files_status)
    })
    .await
    .unwrap_or(("error", "error"));

    let healthy = db_status == "connected" && files_status == "available";

    Json(json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "database": db_status,
        "files": files_status,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

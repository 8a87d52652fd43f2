use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::server::app::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, database) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(err) => {
            tracing::error!("Health check database ping failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };

    let body = json!({
        "status": if status.is_success() { "healthy" } else { "unhealthy" },
        "service": "datagrid-server",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    });

    (status, Json(body))
}

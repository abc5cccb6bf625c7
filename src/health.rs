use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::error;

use crate::{error::AppError, state::AppState};

const SERVICE: &str = "userdir";

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/live", get(live))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": now_rfc3339(),
        "service": SERVICE,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}

/// Ready only when the database answers a ping.
async fn ready(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.db).await {
        error!(error = %e, "readiness check: database unreachable");
        return Err(AppError::Unavailable("Database unreachable".into()));
    }
    Ok(Json(json!({
        "status": "ready",
        "timestamp": now_rfc3339(),
    })))
}

async fn live() -> Json<Value> {
    Json(json!({
        "status": "alive",
        "timestamp": now_rfc3339(),
    }))
}

//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use time::OffsetDateTime;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: OffsetDateTime,
}

/// Health check: reports overall status and database reachability
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_status = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "ok",
        Err(_) => "unreachable",
    };

    let status_code = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if db_status == "ok" { "ok" } else { "degraded" }.to_string(),
            database: db_status.to_string(),
            timestamp: OffsetDateTime::now_utc(),
        }),
    )
}

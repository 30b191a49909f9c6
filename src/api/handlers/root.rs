use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": "Pix Bridge API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Cobranças Pix imediatas e com vencimento integradas ao PSP",
        "environment": state.settings.pix.environment.as_str(),
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "cobrancas": "/pix/cobrancas",
            "token": "/token/status"
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = sqlx::query("SELECT 1")
        .execute(&state.service_context.db_pool)
        .await
        .is_ok();

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({
        "status": if database { "healthy" } else { "degraded" },
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

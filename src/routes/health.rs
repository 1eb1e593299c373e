use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database did not answer.
    pub status: &'static str,
    pub version: &'static str,
    pub db_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

/// Liveness plus a round-trip to the database. Always 200; a storage
/// problem is reported in the body.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let started = Instant::now();
    let ping = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;

    let response = match ping {
        Ok(_) => HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            db_ok: true,
            db_latency_ms: Some(started.elapsed().as_millis() as u64),
            db_error: None,
        },
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            HealthResponse {
                status: "degraded",
                version: env!("CARGO_PKG_VERSION"),
                db_ok: false,
                db_latency_ms: None,
                db_error: Some(err.to_string()),
            }
        }
    };

    Json(response)
}

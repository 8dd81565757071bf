//! Health probe with a database-aware status payload.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::time::{timeout, Duration};
use tracing::{info_span, warn, Instrument};
use utoipa::ToSchema;

use crate::GIT_COMMIT_HASH;

const HEALTH_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health",
)]
pub async fn health(pool: Extension<PgPool>) -> impl IntoResponse {
    let span = info_span!("db.ping", db.system = "postgresql", db.operation = "SELECT");
    let probe = timeout(
        Duration::from_secs(HEALTH_DB_TIMEOUT_SECONDS),
        sqlx::query("SELECT 1").execute(&pool.0).instrument(span),
    )
    .await;

    let db_healthy = match probe {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            warn!(error = %err, "health database probe failed");
            false
        }
        Err(_) => {
            warn!("health database probe timed out");
            false
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_healthy { "ok" } else { "error" }.to_string(),
    };

    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

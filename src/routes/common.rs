//! Service routes next to the mounted resource: liveness, readiness, build and resource info.

use crate::schema::UnknownKeys;
use crate::store::DocumentDatabase;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// What `/info` reports about the mounted resource.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub collection: String,
    /// Mount path, `/<collection>`.
    pub path: String,
    /// Top-level field names, in schema order.
    pub fields: Vec<String>,
    pub unknown_keys: UnknownKeys,
}

#[derive(Clone)]
struct ServiceState {
    db: Arc<dyn DocumentDatabase>,
    resource: Arc<ResourceInfo>,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    database: &'static str,
}

#[derive(Serialize)]
struct InfoBody {
    name: &'static str,
    version: &'static str,
    resource: ResourceInfo,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ready(State(state): State<ServiceState>) -> (StatusCode, Json<ReadyBody>) {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyBody {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, collection = %state.resource.collection, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyBody {
                    status: "degraded",
                    database: "unavailable",
                }),
            )
        }
    }
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn info(State(state): State<ServiceState>) -> Json<InfoBody> {
    Json(InfoBody {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        resource: state.resource.as_ref().clone(),
    })
}

/// GET /health, /ready (database ping), /version, and /info describing `resource`.
pub fn service_routes(db: Arc<dyn DocumentDatabase>, resource: ResourceInfo) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .route("/info", get(info))
        .with_state(ServiceState {
            db,
            resource: Arc::new(resource),
        })
}

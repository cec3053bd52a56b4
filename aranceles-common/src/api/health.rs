//! Health check and liveness endpoints

use std::sync::Arc;

use axum::{extract::FromRef, extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

/// Lifecycle of the background event consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerStatus {
    /// Not started (tests, or broker disabled)
    #[default]
    Idle,
    Connecting,
    Running,
    /// Connection attempts exhausted; no events will be applied
    Failed,
}

/// Shared, cloneable view of the consumer status
#[derive(Debug, Clone, Default)]
pub struct ConsumerHealth {
    inner: Arc<RwLock<ConsumerStatus>>,
}

impl ConsumerHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, status: ConsumerStatus) {
        *self.inner.write().await = status;
    }

    pub async fn get(&self) -> ConsumerStatus {
        *self.inner.read().await
    }
}

/// Identity reported by `/health`
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub module: &'static str,
    /// Crate version of the service binary
    pub version: &'static str,
    pub consumer: ConsumerHealth,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub consumer: ConsumerStatus,
}

/// GET /health
pub async fn health_check(State(info): State<ServiceInfo>) -> Json<HealthResponse> {
    let consumer = info.consumer.get().await;
    let status = if consumer == ConsumerStatus::Failed {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: info.module.to_string(),
        version: info.version.to_string(),
        consumer,
    })
}

/// GET /api/v1/
pub async fn ping() -> Json<Value> {
    Json(json!({ "msg": "ok" }))
}

/// Build health and liveness routes for any state exposing [`ServiceInfo`]
pub fn health_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ServiceInfo: FromRef<S>,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/", get(ping))
}

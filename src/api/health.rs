use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::app_state::{AppState, ServiceHealth};

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    probe: &'static str,
    status: &'static str,
    generated_at: String,
}

impl ProbeResponse {
    fn new(probe: &'static str, status: &'static str) -> Self {
        Self {
            probe,
            status,
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// `GET /healthz` — liveness: the process is up and serving requests.
pub async fn healthz() -> (StatusCode, Json<ProbeResponse>) {
    (StatusCode::OK, Json(ProbeResponse::new("healthz", "ok")))
}

/// `GET /readyz` — readiness: model loaded and (publisher connected or
/// unconfigured). Degraded is still reported as ready — the inference path
/// itself is unaffected by a detached publisher.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    match state.health() {
        ServiceHealth::Healthy => (StatusCode::OK, Json(ProbeResponse::new("readyz", "ok"))),
        ServiceHealth::Degraded => (
            StatusCode::OK,
            Json(ProbeResponse::new("readyz", "degraded")),
        ),
        ServiceHealth::Unhealthy => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse::new("readyz", "unhealthy")),
        ),
    }
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    model_id: String,
    model_version: String,
    loaded: bool,
}

/// `GET /v1/model/info`
pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    Json(ModelInfoResponse {
        model_id: state.model.model_id.clone(),
        model_version: state.model.model_version.clone(),
        loaded: state.detector.is_loaded(),
    })
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

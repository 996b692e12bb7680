//! The HTTP half of the Servicer: axum routes over the same `AppState` the
//! gRPC half uses, matching the admin health-route split seen in
//! `otap-dataflow/crates/admin`.

mod dto;
mod handlers;
mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/infer", post(handlers::infer))
        .route("/v1/infer/batch", post(handlers::infer_batch))
        .route("/v1/model/info", get(health::model_info))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
}

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use ppe_batcher::Batcher;
use ppe_bus::Publisher;
use ppe_detector::Detector;
use ppe_lifecycle::LifecycleCoordinator;

/// Service-level health derivation, per the response composition rules:
/// healthy iff the model is loaded and the publisher is either connected or
/// unconfigured; degraded iff loaded but the publisher is detached;
/// unhealthy iff the model is not loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Identifies the loaded model for `/v1/model/info` and response metadata.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_version: String,
}

/// Shared state handed to every axum handler and gRPC call.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub batcher: Arc<Batcher>,
    pub publisher: Option<Arc<Publisher>>,
    pub lifecycle: Arc<LifecycleCoordinator>,
    pub model: ModelMetadata,
    pub service_name: String,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn health(&self) -> ServiceHealth {
        if !self.detector.is_loaded() {
            return ServiceHealth::Unhealthy;
        }
        match &self.publisher {
            None => ServiceHealth::Healthy,
            Some(publisher) => {
                if publisher.health().connected {
                    ServiceHealth::Healthy
                } else {
                    ServiceHealth::Degraded
                }
            }
        }
    }
}

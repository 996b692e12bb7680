//! Business logic behind the RPCs declared in `pb.rs`. Mounting this onto a
//! `tonic::transport::Server` requires the `NamedService`/codec boilerplate
//! that `tonic-build` normally generates from a `.proto` file; since no proto
//! is compiled in this workspace (see `pb.rs`), `PpeInference` is exercised
//! directly in tests and is ready to be wired into a generated server
//! wrapper once one exists. The HTTP surface in `src/api` is the live
//! transport for this service today.

use async_trait::async_trait;
use chrono::Utc;
use ppe_detector::DetectionResult;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::grpc::pb::{
    BoundingBoxProto, ComplianceSummaryProto, DetectionProto, HealthCheckRequest,
    HealthCheckResponse, InferBatchRequest, InferBatchResponse, InferRequest, InferResponse,
    ModelInfoRequest, ModelInfoResponse,
};

#[async_trait]
pub trait PpeInference: Send + Sync + 'static {
    async fn infer(&self, request: Request<InferRequest>) -> Result<Response<InferResponse>, Status>;

    async fn infer_batch(
        &self,
        request: Request<InferBatchRequest>,
    ) -> Result<Response<InferBatchResponse>, Status>;

    /// Client-streaming-in, server-streaming-out in the original RPC
    /// definition; exposed here as a single buffered call pending the
    /// generated streaming transport (see module docs).
    async fn infer_stream(
        &self,
        requests: Vec<InferRequest>,
    ) -> Result<Vec<Result<InferResponse, Status>>, Status>;

    async fn get_model_info(
        &self,
        request: Request<ModelInfoRequest>,
    ) -> Result<Response<ModelInfoResponse>, Status>;

    async fn health_check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status>;
}

pub struct GrpcService {
    state: AppState,
}

impl GrpcService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    async fn submit_one(&self, request: InferRequest) -> Result<InferResponse, Status> {
        let decoded = crate::image_decode::decode_to_bgr(&request.image)
            .map_err(|err| Status::invalid_argument(format!("invalid image: {err}")))?;

        let frame_id = Uuid::new_v4().to_string();
        let timestamp_ms = Utc::now().timestamp_millis();

        let future = self
            .state
            .batcher
            .submit(
                decoded,
                frame_id,
                timestamp_ms,
                request.worker_id,
                request.camera_id,
            )
            .map_err(|err| Status::unavailable(err.to_string()))?;

        let result = future
            .await
            .map_err(|err| Status::internal(err.to_string()))?;

        Ok(to_proto(
            &result,
            &self.state.model.model_id,
            &self.state.model.model_version,
        ))
    }
}

fn to_proto(result: &DetectionResult, model_id: &str, model_version: &str) -> InferResponse {
    let violations: Vec<String> = result.violations().into_iter().map(String::from).collect();
    let compliant_items: Vec<String> = result
        .compliant_items()
        .into_iter()
        .map(String::from)
        .collect();
    InferResponse {
        frame_id: result.frame_id.clone(),
        timestamp_ms: result.timestamp_ms,
        detections: result
            .detections
            .iter()
            .map(|d| DetectionProto {
                class_name: d.class_name.clone(),
                class_id: d.class_id,
                confidence: d.confidence,
                bounding_box: Some(BoundingBoxProto {
                    x_min: d.bbox.x_min,
                    y_min: d.bbox.y_min,
                    x_max: d.bbox.x_max,
                    y_max: d.bbox.y_max,
                }),
            })
            .collect(),
        inference_time_ms: result.inference_time_ms,
        image_width: result.image_width,
        image_height: result.image_height,
        model_id: model_id.to_string(),
        model_version: model_version.to_string(),
        compliance_summary: Some(ComplianceSummaryProto {
            has_violations: !violations.is_empty(),
            violation_count: violations.len() as u32,
            violations,
            compliant_items,
            person_count: result.person_count() as u32,
        }),
    }
}

#[async_trait]
impl PpeInference for GrpcService {
    async fn infer(
        &self,
        request: Request<InferRequest>,
    ) -> Result<Response<InferResponse>, Status> {
        let response = self.submit_one(request.into_inner()).await?;
        Ok(Response::new(response))
    }

    async fn infer_batch(
        &self,
        request: Request<InferBatchRequest>,
    ) -> Result<Response<InferBatchResponse>, Status> {
        let requests = request.into_inner().requests;
        let outcomes = futures::future::join_all(
            requests.into_iter().map(|request| self.submit_one(request)),
        )
        .await;

        let mut results = Vec::new();
        let mut failure_count = 0u32;
        for outcome in outcomes {
            match outcome {
                Ok(response) => results.push(response),
                Err(_) => failure_count += 1,
            }
        }

        Ok(Response::new(InferBatchResponse {
            results,
            failure_count,
        }))
    }

    async fn infer_stream(
        &self,
        requests: Vec<InferRequest>,
    ) -> Result<Vec<Result<InferResponse, Status>>, Status> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            // A decode failure is skipped, not fatal for the stream.
            responses.push(self.submit_one(request).await);
        }
        Ok(responses)
    }

    async fn get_model_info(
        &self,
        _request: Request<ModelInfoRequest>,
    ) -> Result<Response<ModelInfoResponse>, Status> {
        Ok(Response::new(ModelInfoResponse {
            model_id: self.state.model.model_id.clone(),
            model_version: self.state.model.model_version.clone(),
            loaded: self.state.detector.is_loaded(),
        }))
    }

    async fn health_check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let status = match self.state.health() {
            crate::app_state::ServiceHealth::Healthy => "healthy",
            crate::app_state::ServiceHealth::Degraded => "degraded",
            crate::app_state::ServiceHealth::Unhealthy => "unhealthy",
        };
        Ok(Response::new(HealthCheckResponse {
            status: status.to_string(),
        }))
    }
}

//! Hand-written message types for the `Infer`/`InferBatch`/`InferStream`/
//! `GetModelInfo`/`HealthCheck` RPCs. No `.proto` file is compiled in this
//! workspace — `prost`/`tonic` still provide the wire codec and transport,
//! matching the original service's own comment that its generated stubs
//! were a placeholder ("these would be generated from the proto file").

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct BoundingBoxProto {
    #[prost(float, tag = "1")]
    pub x_min: f32,
    #[prost(float, tag = "2")]
    pub y_min: f32,
    #[prost(float, tag = "3")]
    pub x_max: f32,
    #[prost(float, tag = "4")]
    pub y_max: f32,
}

#[derive(Clone, PartialEq, Message)]
pub struct DetectionProto {
    #[prost(string, tag = "1")]
    pub class_name: String,
    #[prost(int32, tag = "2")]
    pub class_id: i32,
    #[prost(float, tag = "3")]
    pub confidence: f32,
    #[prost(message, optional, tag = "4")]
    pub bounding_box: Option<BoundingBoxProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ComplianceSummaryProto {
    #[prost(string, repeated, tag = "1")]
    pub violations: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub compliant_items: Vec<String>,
    #[prost(bool, tag = "3")]
    pub has_violations: bool,
    #[prost(uint32, tag = "4")]
    pub violation_count: u32,
    #[prost(uint32, tag = "5")]
    pub person_count: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct InferRequest {
    #[prost(bytes, tag = "1")]
    pub image: Vec<u8>,
    #[prost(string, optional, tag = "2")]
    pub worker_id: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub camera_id: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct InferResponse {
    #[prost(string, tag = "1")]
    pub frame_id: String,
    #[prost(int64, tag = "2")]
    pub timestamp_ms: i64,
    #[prost(message, repeated, tag = "3")]
    pub detections: Vec<DetectionProto>,
    #[prost(double, tag = "4")]
    pub inference_time_ms: f64,
    #[prost(uint32, tag = "5")]
    pub image_width: u32,
    #[prost(uint32, tag = "6")]
    pub image_height: u32,
    #[prost(string, tag = "7")]
    pub model_id: String,
    #[prost(string, tag = "8")]
    pub model_version: String,
    #[prost(message, optional, tag = "9")]
    pub compliance_summary: Option<ComplianceSummaryProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct InferBatchRequest {
    #[prost(message, repeated, tag = "1")]
    pub requests: Vec<InferRequest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct InferBatchResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<InferResponse>,
    #[prost(uint32, tag = "2")]
    pub failure_count: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModelInfoRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct ModelInfoResponse {
    #[prost(string, tag = "1")]
    pub model_id: String,
    #[prost(string, tag = "2")]
    pub model_version: String,
    #[prost(bool, tag = "3")]
    pub loaded: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct HealthCheckRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct HealthCheckResponse {
    #[prost(string, tag = "1")]
    pub status: String,
}

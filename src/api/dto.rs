use std::collections::HashMap;

use ppe_detector::DetectionResult;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BoundingBoxDto {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

#[derive(Debug, Serialize)]
pub struct DetectionDto {
    pub class_name: String,
    pub class_id: i32,
    pub confidence: f32,
    pub bounding_box: BoundingBoxDto,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ComplianceSummaryDto {
    pub violations: Vec<String>,
    pub compliant_items: Vec<String>,
    pub has_violations: bool,
    pub violation_count: usize,
    pub person_count: usize,
}

#[derive(Debug, Serialize)]
pub struct InferResponseDto {
    pub frame_id: String,
    pub timestamp_ms: i64,
    pub detections: Vec<DetectionDto>,
    pub inference_time_ms: f64,
    pub image_width: u32,
    pub image_height: u32,
    pub model_id: String,
    pub model_version: String,
    pub compliance_summary: ComplianceSummaryDto,
}

impl InferResponseDto {
    pub fn from_result(result: &DetectionResult, model_id: &str, model_version: &str) -> Self {
        let violations: Vec<String> = result.violations().into_iter().map(String::from).collect();
        let compliant_items: Vec<String> = result
            .compliant_items()
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            frame_id: result.frame_id.clone(),
            timestamp_ms: result.timestamp_ms,
            detections: result
                .detections
                .iter()
                .map(|d| DetectionDto {
                    class_name: d.class_name.clone(),
                    class_id: d.class_id,
                    confidence: d.confidence,
                    bounding_box: BoundingBoxDto {
                        x_min: d.bbox.x_min,
                        y_min: d.bbox.y_min,
                        x_max: d.bbox.x_max,
                        y_max: d.bbox.y_max,
                    },
                    metadata: d.metadata.clone(),
                })
                .collect(),
            inference_time_ms: result.inference_time_ms,
            image_width: result.image_width,
            image_height: result.image_height,
            model_id: model_id.to_string(),
            model_version: model_version.to_string(),
            compliance_summary: ComplianceSummaryDto {
                has_violations: !violations.is_empty(),
                violation_count: violations.len(),
                violations,
                compliant_items,
                person_count: result.person_count(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InferBatchResponseDto {
    pub results: Vec<Option<InferResponseDto>>,
    pub failure_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    NotRunning,
    InferenceFailed,
    Cancelled,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponseDto {
    pub code: ErrorCode,
    pub message: String,
}

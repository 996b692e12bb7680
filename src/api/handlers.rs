use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, histogram};
use ppe_batcher::BatchError;
use tracing::warn;
use uuid::Uuid;

use crate::api::dto::{ErrorCode, ErrorResponseDto, InferBatchResponseDto, InferResponseDto};
use crate::app_state::AppState;
use crate::image_decode::decode_to_bgr;

type ApiError = (StatusCode, Json<ErrorResponseDto>);

fn invalid_argument(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponseDto {
            code: ErrorCode::InvalidArgument,
            message: message.into(),
        }),
    )
}

fn batch_error_response(err: BatchError) -> ApiError {
    let (status, code) = match err {
        BatchError::NotRunning => (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::NotRunning),
        BatchError::QueueFull => (StatusCode::TOO_MANY_REQUESTS, ErrorCode::NotRunning),
        BatchError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Cancelled),
        BatchError::InferenceFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InferenceFailed)
        }
    };
    (
        status,
        Json(ErrorResponseDto {
            code,
            message: err.to_string(),
        }),
    )
}

struct ParsedUpload {
    images: Vec<Bytes>,
    worker_id: Option<String>,
    camera_id: Option<String>,
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ParsedUpload, ApiError> {
    let mut images = Vec::new();
    let mut worker_id = None;
    let mut camera_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| invalid_argument(err.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "image" | "images" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| invalid_argument(err.to_string()))?;
                images.push(bytes);
            }
            "worker_id" => {
                worker_id = field.text().await.ok();
            }
            "camera_id" => {
                camera_id = field.text().await.ok();
            }
            _ => {}
        }
    }

    Ok(ParsedUpload {
        images,
        worker_id,
        camera_id,
    })
}

/// `POST /v1/infer` — single image, multipart field `image`.
pub async fn infer(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<InferResponseDto>, ApiError> {
    let upload = parse_multipart(multipart).await?;
    let image_bytes = upload
        .images
        .into_iter()
        .next()
        .ok_or_else(|| invalid_argument("missing `image` field"))?;

    let decoded = decode_to_bgr(&image_bytes)
        .map_err(|err| invalid_argument(format!("invalid image: {err}")))?;

    let frame_id = Uuid::new_v4().to_string();
    let timestamp_ms = Utc::now().timestamp_millis();

    let future = state
        .batcher
        .submit(
            decoded,
            frame_id,
            timestamp_ms,
            upload.worker_id,
            upload.camera_id,
        )
        .map_err(batch_error_response)?;

    let outcome = future.await;
    counter!("ppe_inference_requests_total", "endpoint" => "infer", "status" => if outcome.is_ok() { "ok" } else { "error" }).increment(1);
    let result = outcome.map_err(batch_error_response)?;
    histogram!("ppe_inference_latency_seconds", "endpoint" => "infer")
        .record(result.inference_time_ms / 1000.0);

    Ok(Json(InferResponseDto::from_result(
        &result,
        &state.model.model_id,
        &state.model.model_version,
    )))
}

/// `POST /v1/infer/batch` — multiple images under repeated `image` fields.
/// Every item is submitted concurrently; a per-item failure increments the
/// batch's failure count rather than failing the whole request.
pub async fn infer_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<InferBatchResponseDto>, ApiError> {
    let upload = parse_multipart(multipart).await?;
    if upload.images.is_empty() {
        return Err(invalid_argument("no `image` fields present"));
    }

    let submissions = upload.images.into_iter().map(|image_bytes| {
        let state = state.clone();
        let worker_id = upload.worker_id.clone();
        let camera_id = upload.camera_id.clone();
        async move {
            let decoded = decode_to_bgr(&image_bytes)
                .map_err(|err| format!("invalid image: {err}"))?;
            let frame_id = Uuid::new_v4().to_string();
            let timestamp_ms = Utc::now().timestamp_millis();
            let future = state
                .batcher
                .submit(decoded, frame_id, timestamp_ms, worker_id, camera_id)
                .map_err(|err| err.to_string())?;
            future.await.map_err(|err| err.to_string())
        }
    });

    let outcomes = join_all(submissions).await;
    let mut results = Vec::with_capacity(outcomes.len());
    let mut failure_count = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(result) => {
                results.push(Some(InferResponseDto::from_result(
                    &result,
                    &state.model.model_id,
                    &state.model.model_version,
                )));
            }
            Err(message) => {
                warn!(%message, "batch item failed");
                failure_count += 1;
                results.push(None);
            }
        }
    }

    Ok(Json(InferBatchResponseDto {
        results,
        failure_count,
    }))
}

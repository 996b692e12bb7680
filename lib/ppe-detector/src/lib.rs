//! The `Detector` boundary.
//!
//! Everything downstream of this crate (the batcher, the servicer) treats
//! model loading, preprocessing, tensor execution and post-processing as
//! opaque: a batched `predict` call in, a [`DetectionResult`] per image out.
//! Weight loading, GPU memory arbitration and the actual detection
//! architecture are out of scope for this workspace — see a production
//! `Detector` implementation (ONNX Runtime, TensorRT, ...) for that half of
//! the system.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use ppe_schemas::BoundingBox;
use snafu::Snafu;

/// A decoded image in whatever pixel layout the concrete `Detector`
/// implementation expects (typically interleaved BGR8, matching the
/// OpenCV-style decode the original service used).
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

/// A single detected object within one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub class_id: i32,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub metadata: HashMap<String, String>,
}

/// The detector's output for one input image.
///
/// Invariant upheld by the concrete `Detector` implementation, not by this
/// type: every `Detection::confidence` is `>=` the detector's configured
/// confidence threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub frame_id: String,
    pub timestamp_ms: i64,
    pub detections: Vec<Detection>,
    pub inference_time_ms: f64,
    pub image_width: u32,
    pub image_height: u32,
    pub metadata: HashMap<String, String>,
}

impl DetectionResult {
    /// Class names prefixed `no_`, e.g. `no_helmet` — the compliance
    /// violations observed in this frame.
    pub fn violations(&self) -> Vec<&str> {
        self.detections
            .iter()
            .filter(|d| d.class_name.starts_with("no_"))
            .map(|d| d.class_name.as_str())
            .collect()
    }

    /// Present-and-compliant PPE items: exactly `{helmet, vest, goggles}`.
    pub fn compliant_items(&self) -> Vec<&str> {
        self.detections
            .iter()
            .filter(|d| matches!(d.class_name.as_str(), "helmet" | "vest" | "goggles"))
            .map(|d| d.class_name.as_str())
            .collect()
    }

    pub fn person_count(&self) -> usize {
        self.detections
            .iter()
            .filter(|d| d.class_name == "person")
            .count()
    }
}

#[derive(Debug, Clone, Snafu)]
pub enum DetectorError {
    #[snafu(display("model is not loaded"))]
    NotLoaded,
    #[snafu(display("inference backend raised: {message}"))]
    Backend { message: String },
}

/// The external inference model: load it once, warm it up, then run
/// batched predictions for the remainder of the process lifetime.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Loads weights and prepares the execution backend. Must be called
    /// before `predict`.
    async fn load(&self) -> Result<(), DetectorError>;

    /// Runs `batch_size` synthetic predictions to trigger JIT/kernel
    /// compilation and CUDA context warmup before real traffic arrives.
    async fn warmup(&self, batch_size: usize) -> Result<(), DetectorError>;

    /// Releases backend resources. Idempotent.
    async fn unload(&self) -> Result<(), DetectorError>;

    /// `true` once `load` has completed and before `unload`.
    fn is_loaded(&self) -> bool;

    /// Runs inference over a batch. Parallel arrays: `images[i]` corresponds
    /// to `frame_ids[i]` and `timestamps_ms[i]`, and `results[i]` in the
    /// returned vector corresponds to the same index.
    async fn predict(
        &self,
        images: &[DecodedImage],
        frame_ids: &[String],
        timestamps_ms: &[i64],
    ) -> Result<Vec<DetectionResult>, DetectorError>;
}

pub mod synthetic;

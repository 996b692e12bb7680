//! A synthetic `Detector` used by tests and by the reference binary when no
//! real inference backend is configured.
//!
//! Mirrors the shape of `crate::test_util::mock::sinks::basic` in the
//! teacher's codebase: a minimal, fully in-memory stand-in for an external
//! dependency, with a knob to make it fail on demand so callers can exercise
//! the `InferenceFailed` path deterministically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ppe_schemas::BoundingBox;

use crate::{DecodedImage, Detection, DetectionResult, Detector, DetectorError};

/// Builds a fixed-shape `DetectionResult` for every input image: one
/// `person` and one `no_helmet` detection. Good enough to exercise the
/// batcher, publisher and servicer without a GPU.
pub struct SyntheticDetector {
    loaded: AtomicBool,
    /// When set, the next `predict` call fails with this message instead of
    /// returning a result, then clears itself.
    fail_next: Mutex<Option<String>>,
}

impl Default for SyntheticDetector {
    fn default() -> Self {
        Self {
            loaded: AtomicBool::new(false),
            fail_next: Mutex::new(None),
        }
    }
}

impl SyntheticDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the detector to fail the very next `predict` call with `message`.
    pub fn fail_next_predict(&self, message: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(message.into());
    }

    fn synthetic_detections(&self) -> Vec<Detection> {
        vec![
            Detection {
                class_name: "person".into(),
                class_id: 0,
                confidence: 0.97,
                bbox: BoundingBox::new(0.1, 0.1, 0.6, 0.9).expect("valid synthetic bbox"),
                metadata: Default::default(),
            },
            Detection {
                class_name: "no_helmet".into(),
                class_id: 1,
                confidence: 0.82,
                bbox: BoundingBox::new(0.15, 0.1, 0.4, 0.3).expect("valid synthetic bbox"),
                metadata: Default::default(),
            },
        ]
    }
}

#[async_trait]
impl Detector for SyntheticDetector {
    async fn load(&self) -> Result<(), DetectorError> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn warmup(&self, batch_size: usize) -> Result<(), DetectorError> {
        if !self.is_loaded() {
            return Err(DetectorError::NotLoaded);
        }
        let images: Vec<DecodedImage> = (0..batch_size)
            .map(|_| DecodedImage {
                width: 640,
                height: 480,
                data: Default::default(),
            })
            .collect();
        let frame_ids: Vec<String> = (0..batch_size).map(|i| format!("warmup-{i}")).collect();
        let timestamps: Vec<i64> = vec![0; batch_size];
        self.predict(&images, &frame_ids, &timestamps).await?;
        Ok(())
    }

    async fn unload(&self) -> Result<(), DetectorError> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn predict(
        &self,
        images: &[DecodedImage],
        frame_ids: &[String],
        timestamps_ms: &[i64],
    ) -> Result<Vec<DetectionResult>, DetectorError> {
        if !self.is_loaded() {
            return Err(DetectorError::NotLoaded);
        }
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(DetectorError::Backend { message });
        }

        Ok(images
            .iter()
            .zip(frame_ids)
            .zip(timestamps_ms)
            .map(|((image, frame_id), timestamp_ms)| DetectionResult {
                frame_id: frame_id.clone(),
                timestamp_ms: *timestamp_ms,
                detections: self.synthetic_detections(),
                inference_time_ms: 1.5,
                image_width: image.width,
                image_height: image.height,
                metadata: Default::default(),
            })
            .collect())
    }
}

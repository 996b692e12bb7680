//! Dataclass-like wire records for the detection/alert message bus.
//!
//! Optional fields are represented as `Option<T>`, which serde serializes as
//! JSON `null` when absent (never omitted) and which the decoder treats as
//! missing-defaults-to-`None` on the way back in, matching the `decode(encode(x))
//! == x` round-trip invariant for every in-domain value.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ActivityType, AlertSeverity, AlertStatus, AlertType, PpeViolationType};

/// Normalised corner-form bounding box. `x_min <= x_max` and `y_min <= y_max`,
/// all four values in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// Error returned when constructing a [`BoundingBox`] from out-of-range or
/// misordered coordinates.
#[derive(Debug, Clone, Copy, PartialEq, snafu::Snafu)]
pub enum BoundingBoxError {
    #[snafu(display("x_min ({x_min}) must be <= x_max ({x_max})"))]
    XOrder { x_min: f32, x_max: f32 },
    #[snafu(display("y_min ({y_min}) must be <= y_max ({y_max})"))]
    YOrder { y_min: f32, y_max: f32 },
    #[snafu(display("coordinate {value} is outside the normalised range [0, 1]"))]
    OutOfRange { value: f32 },
}

impl BoundingBox {
    /// Builds a bounding box, rejecting violations of the corner-ordering and
    /// normalised-range invariant.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Result<Self, BoundingBoxError> {
        for value in [x_min, y_min, x_max, y_max] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BoundingBoxError::OutOfRange { value });
            }
        }
        if x_min > x_max {
            return Err(BoundingBoxError::XOrder { x_min, x_max });
        }
        if y_min > y_max {
            return Err(BoundingBoxError::YOrder { y_min, y_max });
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}

/// Confidence for a detection: an overall score plus an optional per-signal
/// breakdown (e.g. `{"model": 0.97, "tracker": 0.91}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub overall: f32,
    #[serde(default)]
    pub breakdown: HashMap<String, f32>,
}

/// A single PPE violation observed in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpeViolation {
    pub violation_type: PpeViolationType,
    pub bounding_box: BoundingBox,
    pub confidence: ConfidenceScore,
    #[serde(default)]
    pub worker_id: Option<String>,
}

/// A single activity observation in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDetection {
    pub activity_type: ActivityType,
    pub bounding_box: BoundingBox,
    pub confidence: ConfidenceScore,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// The `detections` topic payload: one frame's worth of PPE and activity
/// observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub event_id: String,
    pub frame_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    pub model_version: String,
    pub processing_latency_ms: i64,
    #[serde(default)]
    pub ppe_violations: Vec<PpeViolation>,
    #[serde(default)]
    pub activity_detections: Vec<ActivityDetection>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The `frames` topic payload: bare metadata about an ingested frame, with no
/// detection content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub frame_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The `alerts` topic payload: a safety-critical event derived from one or
/// more detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub device_id: String,
    #[serde(default)]
    pub worker_id: Option<String>,
    pub rule_id: String,
    pub priority_score: i32,
    #[serde(default)]
    pub source_detection_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_rejects_misordered_corners() {
        assert!(matches!(
            BoundingBox::new(0.6, 0.0, 0.4, 1.0),
            Err(BoundingBoxError::XOrder { .. })
        ));
        assert!(matches!(
            BoundingBox::new(0.0, 0.9, 1.0, 0.1),
            Err(BoundingBoxError::YOrder { .. })
        ));
    }

    #[test]
    fn bounding_box_rejects_out_of_range() {
        assert!(matches!(
            BoundingBox::new(-0.1, 0.0, 1.0, 1.0),
            Err(BoundingBoxError::OutOfRange { .. })
        ));
    }

    #[test]
    fn bounding_box_accepts_valid_corners() {
        assert!(BoundingBox::new(0.1, 0.2, 0.8, 0.9).is_ok());
    }
}

//! Wire-level message types for the PPE detection pipeline.
//!
//! These mirror the JSON schema described for the `frames`, `detections` and
//! `alerts` topics: deterministic encoding, enums by integer value, ISO-8601
//! timestamps, and a codec with the `decode(encode(x)) == x` round-trip
//! invariant.

pub mod codec;
pub mod enums;
pub mod types;

pub use codec::{decode, encode, CodecError};
pub use enums::{ActivityType, AlertSeverity, AlertStatus, AlertType, PpeViolationType};
pub use types::{
    ActivityDetection, Alert, BoundingBox, BoundingBoxError, ConfidenceScore, DetectionEvent,
    FrameMetadata, PpeViolation,
};

use ppe_detector::DetectorError;
use snafu::Snafu;

/// Failure modes for a submitted frame. Every submission resolves to exactly
/// one of `Ok(DetectionResult)` or one of these.
#[derive(Debug, Clone, Snafu)]
pub enum BatchError {
    #[snafu(display("batcher is not running"))]
    NotRunning,
    #[snafu(display("batcher queue is full"))]
    QueueFull,
    #[snafu(display("submission was cancelled"))]
    Cancelled,
    #[snafu(display("inference failed: {source}"))]
    InferenceFailed { source: DetectorError },
}

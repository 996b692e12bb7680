use ppe_detector::DetectionResult;

/// The batcher's view of a message-bus publisher: fire-and-forget, never
/// blocking the batch loop and never raising into it. Implemented by
/// `ppe_bus::Publisher`.
pub trait ResultSink: Send + Sync {
    /// Hands a result to the publisher without waiting for broker
    /// acknowledgement. Returns `false` if the result was dropped (e.g.
    /// backpressure) — the batcher logs this but the caller's future still
    /// resolves with the detection result regardless.
    fn publish(
        &self,
        result: &DetectionResult,
        worker_id: Option<&str>,
        camera_id: Option<&str>,
    ) -> bool;

    /// Whether the sink is currently able to accept publishes. A batcher
    /// configured with a sink that reports unhealthy still resolves
    /// submissions; it simply skips the publish attempt (matching "if the
    /// publisher is configured and healthy" in the batch formation
    /// algorithm).
    fn is_healthy(&self) -> bool {
        true
    }
}

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use ppe_detector::{DecodedImage, DetectionResult};
use tokio::sync::oneshot;

use crate::error::BatchError;

/// An in-flight request carried inside the batcher, from `submit` until its
/// completion is resolved. Invariant: every `Submission` is resolved exactly
/// once, with success, failure, or cancellation.
pub(crate) struct Submission {
    pub image: DecodedImage,
    pub frame_id: String,
    pub timestamp_ms: i64,
    pub worker_id: Option<String>,
    pub camera_id: Option<String>,
    pub completion: oneshot::Sender<Result<DetectionResult, BatchError>>,
}

/// The handle returned by `Batcher::submit`. Resolves once the batch
/// containing this submission completes (or the batcher is stopped, or the
/// caller drops the handle — in which case the result is still computed and
/// published, but resolution becomes a no-op).
pub struct SubmitFuture {
    pub(crate) receiver: oneshot::Receiver<Result<DetectionResult, BatchError>>,
}

impl Future for SubmitFuture {
    type Output = Result<DetectionResult, BatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The sender was dropped without resolving, which only happens
            // if the batcher task itself panicked mid-batch.
            Poll::Ready(Err(_)) => Poll::Ready(Err(BatchError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

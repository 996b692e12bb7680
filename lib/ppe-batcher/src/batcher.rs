use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ppe_detector::{DecodedImage, Detector};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BatcherConfig;
use crate::error::BatchError;
use crate::sink::ResultSink;
use crate::submission::{Submission, SubmitFuture};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopped,
}

/// Point-in-time counters for observability. Cheap to read; safe to poll on
/// every scrape.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatcherStats {
    pub total_requests: u64,
    pub total_batches: u64,
    pub queue_depth: usize,
    pub avg_batch_size: f64,
}

struct Shared {
    queue: Mutex<VecDeque<Submission>>,
    notify: Notify,
    state: Mutex<State>,
    total_requests: AtomicU64,
    total_batches: AtomicU64,
    total_batched_items: AtomicU64,
    queue_depth: AtomicUsize,
}

/// Collects individual inference requests into size/time-bounded mini-batches
/// and feeds them to a single `Detector`. One `Batcher` owns exactly one
/// detector instance; fan-out across detectors is a concern for the caller.
pub struct Batcher {
    shared: Arc<Shared>,
    detector: Arc<dyn Detector>,
    sink: Option<Arc<dyn ResultSink>>,
    config: BatcherConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Batcher {
    pub fn new(detector: Arc<dyn Detector>, config: BatcherConfig) -> Self {
        Self::with_sink(detector, config, None)
    }

    pub fn with_sink(
        detector: Arc<dyn Detector>,
        config: BatcherConfig,
        sink: Option<Arc<dyn ResultSink>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                state: Mutex::new(State::Idle),
                total_requests: AtomicU64::new(0),
                total_batches: AtomicU64::new(0),
                total_batched_items: AtomicU64::new(0),
                queue_depth: AtomicUsize::new(0),
            }),
            detector,
            sink,
            config,
            task: Mutex::new(None),
        }
    }

    /// Starts the background batch-formation loop. Idempotent while already
    /// running; fails with `NotRunning` if the batcher was previously
    /// stopped — a stopped batcher is terminal and must be recreated.
    pub fn start(&self) -> Result<(), BatchError> {
        let mut state = self.shared.state.lock().unwrap();
        match *state {
            State::Running => return Ok(()),
            State::Stopped => return Err(BatchError::NotRunning),
            State::Idle => {}
        }
        *state = State::Running;
        drop(state);

        let shared = Arc::clone(&self.shared);
        let detector = Arc::clone(&self.detector);
        let sink = self.sink.clone();
        let config = self.config.clone();
        let handle = tokio::spawn(run_batch_loop(shared, detector, sink, config));
        *self.task.lock().unwrap() = Some(handle);
        info!(
            max_batch_size = self.config.max_batch_size,
            batch_timeout_ms = self.config.batch_timeout.as_millis() as u64,
            "batcher started"
        );
        Ok(())
    }

    /// Stops the batch loop, letting any in-flight `predict` call finish,
    /// then cancels everything still queued. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state != State::Running {
                *state = State::Stopped;
                return;
            }
            *state = State::Stopped;
        }
        self.shared.notify.notify_one();

        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(%err, "batcher task panicked during shutdown");
            }
        }

        let mut queue = self.shared.queue.lock().unwrap();
        for submission in queue.drain(..) {
            let _ = submission.completion.send(Err(BatchError::Cancelled));
        }
        self.shared.queue_depth.store(0, Ordering::SeqCst);
        info!("batcher stopped");
    }

    /// Enqueues a frame for inference, returning a future that resolves once
    /// its containing batch completes.
    pub fn submit(
        &self,
        image: DecodedImage,
        frame_id: String,
        timestamp_ms: i64,
        worker_id: Option<String>,
        camera_id: Option<String>,
    ) -> Result<SubmitFuture, BatchError> {
        {
            let state = self.shared.state.lock().unwrap();
            if *state != State::Running {
                return Err(BatchError::NotRunning);
            }
        }

        let (tx, rx) = oneshot::channel();
        let submission = Submission {
            image,
            frame_id,
            timestamp_ms,
            worker_id,
            camera_id,
            completion: tx,
        };

        let mut queue = self.shared.queue.lock().unwrap();
        if queue.len() >= self.config.effective_queue_capacity() {
            return Err(BatchError::QueueFull);
        }
        queue.push_back(submission);
        let depth = queue.len();
        drop(queue);

        self.shared.total_requests.fetch_add(1, Ordering::Relaxed);
        self.shared.queue_depth.store(depth, Ordering::SeqCst);
        if depth >= self.config.max_batch_size {
            self.shared.notify.notify_one();
        }

        Ok(SubmitFuture { receiver: rx })
    }

    pub fn queue_depth(&self) -> usize {
        self.shared.queue_depth.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> BatcherStats {
        let total_batches = self.shared.total_batches.load(Ordering::Relaxed);
        let total_items = self.shared.total_batched_items.load(Ordering::Relaxed);
        let avg_batch_size = if total_batches == 0 {
            0.0
        } else {
            total_items as f64 / total_batches as f64
        };
        BatcherStats {
            total_requests: self.shared.total_requests.load(Ordering::Relaxed),
            total_batches,
            queue_depth: self.queue_depth(),
            avg_batch_size,
        }
    }
}

async fn run_batch_loop(
    shared: Arc<Shared>,
    detector: Arc<dyn Detector>,
    sink: Option<Arc<dyn ResultSink>>,
    config: BatcherConfig,
) {
    loop {
        if *shared.state.lock().unwrap() != State::Running {
            return;
        }

        tokio::select! {
            _ = shared.notify.notified() => {}
            _ = tokio::time::sleep(config.batch_timeout) => {}
        }

        if *shared.state.lock().unwrap() != State::Running {
            return;
        }

        let batch = {
            let mut queue = shared.queue.lock().unwrap();
            let take = queue.len().min(config.max_batch_size);
            let batch: Vec<Submission> = queue.drain(..take).collect();
            shared.queue_depth.store(queue.len(), Ordering::SeqCst);
            batch
        };

        if batch.is_empty() {
            continue;
        }

        debug!(batch_size = batch.len(), "formed batch");
        process_batch(&shared, &detector, sink.as_deref(), batch).await;
    }
}

async fn process_batch(
    shared: &Shared,
    detector: &Arc<dyn Detector>,
    sink: Option<&dyn ResultSink>,
    batch: Vec<Submission>,
) {
    let images: Vec<DecodedImage> = batch.iter().map(|s| s.image.clone()).collect();
    let frame_ids: Vec<String> = batch.iter().map(|s| s.frame_id.clone()).collect();
    let timestamps: Vec<i64> = batch.iter().map(|s| s.timestamp_ms).collect();

    let outcome = detector.predict(&images, &frame_ids, &timestamps).await;

    shared
        .total_batches
        .fetch_add(1, Ordering::Relaxed);
    shared
        .total_batched_items
        .fetch_add(batch.len() as u64, Ordering::Relaxed);

    match outcome {
        Ok(results) => {
            if results.len() != batch.len() {
                error!(
                    expected = batch.len(),
                    got = results.len(),
                    "detector returned mismatched result count for batch"
                );
            }
            for (submission, result) in batch.into_iter().zip(results.into_iter()) {
                if let Some(sink) = sink {
                    if sink.is_healthy() {
                        let published = sink.publish(
                            &result,
                            submission.worker_id.as_deref(),
                            submission.camera_id.as_deref(),
                        );
                        if !published {
                            warn!(frame_id = %submission.frame_id, "result publish dropped");
                        }
                    }
                }
                let _ = submission.completion.send(Ok(result));
            }
        }
        Err(err) => {
            warn!(batch_size = batch.len(), %err, "inference failed for batch");
            for submission in batch {
                let failure = Err(BatchError::InferenceFailed { source: err.clone() });
                let _ = submission.completion.send(failure);
            }
        }
    }
}

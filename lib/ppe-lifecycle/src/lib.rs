//! Startup/shutdown ordering: detector load, warmup, publisher connect,
//! batcher start, and the reverse on teardown — matching the original
//! service's lifespan hooks but as an explicit, testable coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ppe_batcher::{BatchError, Batcher};
use ppe_bus::Publisher;
use ppe_detector::{Detector, DetectorError};
use snafu::{ResultExt, Snafu};
use tracing::{error, info, warn};

/// Number of synthetic batches run during warmup, matching the original
/// `PPEDetector.warmup` behaviour of exercising the backend a few times
/// before real traffic arrives.
const WARMUP_ROUNDS: usize = 3;

#[derive(Debug, Snafu)]
pub enum LifecycleError {
    #[snafu(display("detector failed during startup: {source}"))]
    Detector { source: DetectorError },
    #[snafu(display("batcher failed to start: {source}"))]
    Batcher { source: BatchError },
}

/// Orders the startup and shutdown of the detector, publisher and batcher.
/// The HTTP/RPC servicer is started and stopped by the caller around this
/// coordinator's `start`/`stop` calls — it owns no network listeners itself.
pub struct LifecycleCoordinator {
    detector: Arc<dyn Detector>,
    batcher: Arc<Batcher>,
    publisher: Option<Arc<Publisher>>,
    warmup_batch_size: usize,
    shutdown_grace: Duration,
    degraded: AtomicBool,
}

impl LifecycleCoordinator {
    pub fn new(
        detector: Arc<dyn Detector>,
        batcher: Arc<Batcher>,
        publisher: Option<Arc<Publisher>>,
        warmup_batch_size: usize,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            detector,
            batcher,
            publisher,
            warmup_batch_size,
            shutdown_grace,
            degraded: AtomicBool::new(false),
        }
    }

    /// Loads the detector, runs warmup, connects the publisher (a failure
    /// here degrades rather than aborts startup), then starts the batcher.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.detector.load().await.context(DetectorSnafu)?;

        for round in 0..WARMUP_ROUNDS {
            self.detector
                .warmup(self.warmup_batch_size)
                .await
                .context(DetectorSnafu)?;
            info!(round, "warmup batch complete");
        }

        if let Some(publisher) = &self.publisher {
            if let Err(err) = publisher.connect() {
                warn!(%err, "publisher connect failed at startup; continuing degraded");
                self.degraded.store(true, Ordering::SeqCst);
            }
        }

        self.batcher.start().context(BatcherSnafu)?;
        info!("lifecycle startup complete");
        Ok(())
    }

    /// Reverses startup: waits out the RPC drain grace window, stops the
    /// batcher, flushes and disconnects the publisher, then unloads the
    /// detector. Best-effort — failures are logged, not propagated, since
    /// shutdown must always make forward progress.
    pub async fn stop(&self) {
        tokio::time::sleep(self.shutdown_grace).await;

        self.batcher.stop().await;

        if let Some(publisher) = &self.publisher {
            publisher.disconnect().await;
        }

        if let Err(err) = self.detector.unload().await {
            error!(%err, "detector unload failed during shutdown");
        }

        info!("lifecycle shutdown complete");
    }

    /// `true` once a configured publisher failed to connect at startup.
    /// The service keeps serving inference; readiness reporting should
    /// reflect this.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppe_batcher::BatcherConfig;
    use ppe_detector::synthetic::SyntheticDetector;

    #[tokio::test]
    async fn start_runs_warmup_and_starts_batcher() {
        let detector = Arc::new(SyntheticDetector::new());
        let config = BatcherConfig::new(4, Duration::from_millis(20)).unwrap();
        let batcher = Arc::new(Batcher::new(detector.clone(), config));
        let coordinator =
            LifecycleCoordinator::new(detector.clone(), batcher.clone(), None, 4, Duration::from_millis(0));

        coordinator.start().await.expect("startup should succeed");
        assert!(detector.is_loaded());
        assert!(!coordinator.is_degraded());

        coordinator.stop().await;
        assert!(!detector.is_loaded());
    }
}

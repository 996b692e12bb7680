//! Cross-crate shutdown behaviour: a `LifecycleCoordinator` built from the
//! same collaborators `main` wires together drains in-flight submissions
//! rather than dropping them silently.

use std::sync::Arc;
use std::time::Duration;

use ppe_batcher::{Batcher, BatcherConfig};
use ppe_detector::synthetic::SyntheticDetector;
use ppe_detector::DecodedImage;
use ppe_lifecycle::LifecycleCoordinator;

#[tokio::test]
async fn stop_drains_queue_and_unloads_detector() {
    let detector = Arc::new(SyntheticDetector::new());
    let config = BatcherConfig::new(4, Duration::from_millis(200)).unwrap();
    let batcher = Arc::new(Batcher::new(detector.clone(), config));
    let lifecycle = Arc::new(LifecycleCoordinator::new(
        detector.clone(),
        batcher.clone(),
        None,
        2,
        Duration::from_millis(0),
    ));

    lifecycle.start().await.expect("startup should succeed");
    assert!(detector.is_loaded());

    let image = DecodedImage {
        width: 64,
        height: 64,
        data: Default::default(),
    };
    let pending = batcher
        .submit(image, "frame-a".into(), 0, None, None)
        .expect("submit before shutdown should be accepted");

    lifecycle.stop().await;

    assert!(!detector.is_loaded());
    let outcome = pending.await;
    assert!(outcome.is_err(), "queued submission should be cancelled by shutdown");
}

#[tokio::test]
async fn restart_after_stop_is_rejected() {
    let detector = Arc::new(SyntheticDetector::new());
    let config = BatcherConfig::new(4, Duration::from_millis(50)).unwrap();
    let batcher = Arc::new(Batcher::new(detector.clone(), config));
    let lifecycle = Arc::new(LifecycleCoordinator::new(
        detector.clone(),
        batcher.clone(),
        None,
        2,
        Duration::from_millis(0),
    ));

    lifecycle.start().await.unwrap();
    lifecycle.stop().await;

    let image = DecodedImage {
        width: 64,
        height: 64,
        data: Default::default(),
    };
    let err = batcher
        .submit(image, "frame-b".into(), 0, None, None)
        .expect_err("submitting after shutdown must fail");
    assert!(matches!(err, ppe_batcher::BatchError::NotRunning));
}

//! Exercises `Publisher`/`Consumer` against a real broker. Skipped by
//! default: set `KAFKA_BROKERS` and run with `--ignored` against a
//! disposable Kafka/Redpanda instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ppe_bus::{
    BrokerConfig, Consumer, ConsumerConfig, DeliveryRecord, Handler, Publisher, PublisherConfig,
    SecurityProtocol,
};
use ppe_detector::{Detection, DetectionResult};

fn broker() -> BrokerConfig {
    BrokerConfig {
        bootstrap_servers: std::env::var("KAFKA_BROKERS").unwrap_or_default(),
        security_protocol: SecurityProtocol::Plaintext,
        sasl_mechanism: None,
        sasl_username: None,
        sasl_password: None,
    }
}

struct RecordingHandler {
    seen: std::sync::Mutex<Vec<DeliveryRecord>>,
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn handle(&self, record: &DeliveryRecord) -> Result<(), String> {
        self.seen.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[tokio::test]
#[ignore = "requires a running broker; set KAFKA_BROKERS"]
async fn publishes_and_consumes_a_detection_result() {
    let topic = "ppe-results-it";

    let publisher = Publisher::new(
        PublisherConfig {
            broker: broker(),
            topic: topic.into(),
            max_pending: 100,
            retries: 3,
            request_timeout: Duration::from_secs(5),
            enable_idempotence: true,
            linger: Duration::from_millis(5),
            compression_type: "none".into(),
            disconnect_flush_timeout: Duration::from_secs(10),
        },
        "ppe-inference-it",
    );
    publisher.connect().expect("connect");

    let result = DetectionResult {
        frame_id: "it-frame-1".into(),
        timestamp_ms: 0,
        detections: vec![Detection {
            class_name: "no_vest".into(),
            class_id: 3,
            confidence: 0.95,
            bbox: ppe_schemas::BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap(),
            metadata: HashMap::new(),
        }],
        inference_time_ms: 12.0,
        image_width: 640,
        image_height: 480,
        metadata: HashMap::new(),
    };
    assert!(publisher.publish(&result, None, None).unwrap());
    publisher.flush(5.0).await;

    let consumer = Consumer::new(ConsumerConfig {
        broker: broker(),
        topics: vec![topic.into()],
        group_id: "ppe-inference-it".into(),
        auto_offset_reset: "earliest".into(),
        enable_auto_commit: false,
        session_timeout: Duration::from_secs(10),
        heartbeat_interval: Duration::from_secs(3),
        max_poll_interval: Duration::from_secs(300),
        dlq_topic: None,
    });
    consumer.subscribe(&[topic.to_string()]).expect("subscribe");

    let handler = Arc::new(RecordingHandler {
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let handler_clone = handler.clone();
    let consumer = Arc::new(consumer);
    let consumer_clone = consumer.clone();
    let run_task = tokio::spawn(async move { consumer_clone.run(handler_clone, 1.0).await });

    tokio::time::sleep(Duration::from_secs(3)).await;
    consumer.shutdown();
    run_task.await.unwrap().unwrap();

    assert_eq!(handler.seen.lock().unwrap().len(), 1);
}

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use ppe_batcher::ResultSink;
use ppe_detector::DetectionResult;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout as RdTimeout;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::PublisherConfig;
use crate::error::PublishError;

/// Point-in-time view returned by `Publisher::health`.
#[derive(Debug, Clone)]
pub struct PublisherHealth {
    pub healthy: bool,
    pub connected: bool,
    pub topic: String,
    pub pending: usize,
}

/// `compliant_items` recognises exactly `{helmet, vest, goggles}`;
/// `violations` is every class name with a `no_` prefix.
struct ComplianceSummary {
    violations: Vec<String>,
    compliant_items: Vec<String>,
    has_violations: bool,
    violation_count: usize,
}

fn compliance_summary(result: &DetectionResult) -> ComplianceSummary {
    let violations: Vec<String> = result.violations().into_iter().map(String::from).collect();
    let compliant_items: Vec<String> = result
        .compliant_items()
        .into_iter()
        .map(String::from)
        .collect();
    ComplianceSummary {
        has_violations: !violations.is_empty(),
        violation_count: violations.len(),
        violations,
        compliant_items,
    }
}

/// Accepts detection results and fans them out to the message bus without
/// blocking the inference path. Bounded by `max_pending`: once the number of
/// enqueued-but-unacknowledged messages reaches that bound, `publish` returns
/// `false` instead of enqueueing.
pub struct Publisher {
    config: PublisherConfig,
    service_name: String,
    producer: StdMutex<Option<FutureProducer>>,
    pending: Arc<AtomicI64>,
}

impl Publisher {
    pub fn new(config: PublisherConfig, service_name: impl Into<String>) -> Self {
        Self {
            config,
            service_name: service_name.into(),
            producer: StdMutex::new(None),
            pending: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn connect(&self) -> Result<(), PublishError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.config.broker.bootstrap_servers)
            .set(
                "security.protocol",
                self.config.broker.security_protocol.as_rdkafka_str(),
            )
            .set(
                "message.timeout.ms",
                self.config.request_timeout.as_millis().to_string(),
            )
            .set("retries", self.config.retries.to_string())
            .set(
                "enable.idempotence",
                self.config.enable_idempotence.to_string(),
            )
            .set("linger.ms", self.config.linger.as_millis().to_string())
            .set("compression.type", &self.config.compression_type);

        if let Some(mechanism) = &self.config.broker.sasl_mechanism {
            client_config.set("sasl.mechanism", mechanism.as_rdkafka_str());
            if let Some(username) = &self.config.broker.sasl_username {
                client_config.set("sasl.username", username);
            }
            if let Some(password) = &self.config.broker.sasl_password {
                client_config.set("sasl.password", password);
            }
        }

        let producer: FutureProducer =
            client_config
                .create()
                .map_err(|err| PublishError::ConnectionFailed {
                    message: err.to_string(),
                })?;
        *self.producer.lock().unwrap() = Some(producer);
        Ok(())
    }

    /// Flushes pending messages with a bounded wait, then tears the session
    /// down. Idempotent.
    pub async fn disconnect(&self) {
        self.flush(self.config.disconnect_flush_timeout.as_secs_f64())
            .await;
        *self.producer.lock().unwrap() = None;
    }

    /// Waits until the pending count reaches zero or `timeout_sec` elapses.
    pub async fn flush(&self, timeout_sec: f64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(timeout_sec.max(0.0));
        while self.pending.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Enqueues an outgoing message. Returns `Ok(false)` (never raises) if
    /// the pending count is at capacity or encoding fails synchronously.
    /// Returns `Err(NotConnected)` if called before `connect`.
    pub fn publish(
        &self,
        result: &DetectionResult,
        worker_id: Option<&str>,
        camera_id: Option<&str>,
    ) -> Result<bool, PublishError> {
        let producer = {
            let guard = self.producer.lock().unwrap();
            guard.clone().ok_or(PublishError::NotConnected)?
        };

        if self.pending.load(Ordering::SeqCst) >= self.config.max_pending as i64 {
            warn!(
                topic = %self.config.topic,
                frame_id = %result.frame_id,
                "dropped_backpressure"
            );
            return Ok(false);
        }

        let summary = compliance_summary(result);
        let payload = json!({
            "frame_id": result.frame_id,
            "timestamp_ms": result.timestamp_ms,
            "detections": result.detections.iter().map(|d| json!({
                "class_name": d.class_name,
                "class_id": d.class_id,
                "confidence": d.confidence,
                "bbox": {
                    "x_min": d.bbox.x_min,
                    "y_min": d.bbox.y_min,
                    "x_max": d.bbox.x_max,
                    "y_max": d.bbox.y_max,
                },
            })).collect::<Vec<_>>(),
            "inference_time_ms": result.inference_time_ms,
            "image_width": result.image_width,
            "image_height": result.image_height,
            "worker_id": worker_id,
            "camera_id": camera_id,
            "publish_timestamp_ms": Utc::now().timestamp_millis(),
            "service": self.service_name,
            "compliance_summary": {
                "violations": summary.violations,
                "compliant_items": summary.compliant_items,
                "has_violations": summary.has_violations,
                "violation_count": summary.violation_count,
            },
        });

        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "failed to encode outgoing message");
                return Ok(false);
            }
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = Arc::clone(&self.pending);
        let topic = self.config.topic.clone();
        let key = result.frame_id.clone();
        let frame_id = result.frame_id.clone();

        tokio::spawn(async move {
            let record = FutureRecord::to(&topic).payload(&bytes).key(&key);
            let outcome = producer.send(record, RdTimeout::Never).await;
            let _ = pending.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some((v - 1).max(0))
            });
            if let Err((err, _)) = outcome {
                warn!(%frame_id, %err, "publish delivery failed");
            }
        });

        Ok(true)
    }

    /// Publishes a batch of results, looping over `publish` and counting
    /// successes. Raises `NotConnected` up front rather than per-item,
    /// matching `kafka_producer.py::publish_batch`.
    pub fn publish_batch(
        &self,
        results: &[DetectionResult],
        worker_id: Option<&str>,
        camera_id: Option<&str>,
    ) -> Result<usize, PublishError> {
        if self.producer.lock().unwrap().is_none() {
            return Err(PublishError::NotConnected);
        }
        let successful = results
            .iter()
            .filter(|result| matches!(self.publish(result, worker_id, camera_id), Ok(true)))
            .count();
        debug!(total = results.len(), successful, "batch published to Kafka");
        Ok(successful)
    }

    pub fn health(&self) -> PublisherHealth {
        let connected = self.producer.lock().unwrap().is_some();
        let pending = self.pending.load(Ordering::SeqCst).max(0) as usize;
        PublisherHealth {
            healthy: connected && pending < self.config.max_pending,
            connected,
            topic: self.config.topic.clone(),
            pending,
        }
    }
}

impl ResultSink for Publisher {
    fn publish(
        &self,
        result: &DetectionResult,
        worker_id: Option<&str>,
        camera_id: Option<&str>,
    ) -> bool {
        match Publisher::publish(self, result, worker_id, camera_id) {
            Ok(delivered) => delivered,
            Err(err) => {
                warn!(%err, "publisher not connected; dropping result");
                false
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.health().healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_result() -> DetectionResult {
        DetectionResult {
            frame_id: "frame-1".into(),
            timestamp_ms: 0,
            detections: vec![ppe_detector::Detection {
                class_name: "no_helmet".into(),
                class_id: 1,
                confidence: 0.9,
                bbox: ppe_schemas::BoundingBox::new(0.0, 0.0, 0.5, 0.5).unwrap(),
                metadata: HashMap::new(),
            }],
            inference_time_ms: 1.0,
            image_width: 10,
            image_height: 10,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn publish_before_connect_is_not_connected() {
        let config = PublisherConfig {
            broker: crate::config::BrokerConfig {
                bootstrap_servers: "localhost:9092".into(),
                security_protocol: crate::config::SecurityProtocol::Plaintext,
                sasl_mechanism: None,
                sasl_username: None,
                sasl_password: None,
            },
            topic: "ppe-results".into(),
            max_pending: 10,
            retries: 3,
            request_timeout: Duration::from_secs(5),
            enable_idempotence: false,
            linger: Duration::from_millis(5),
            compression_type: "none".into(),
            disconnect_flush_timeout: Duration::from_secs(10),
        };
        let publisher = Publisher::new(config, "ppe-inference");
        let result = sample_result();
        assert!(matches!(
            publisher.publish(&result, None, None),
            Err(PublishError::NotConnected)
        ));
    }

    #[test]
    fn compliance_summary_recognises_violations_and_compliant_items() {
        let mut result = sample_result();
        result.detections.push(ppe_detector::Detection {
            class_name: "helmet".into(),
            class_id: 2,
            confidence: 0.8,
            bbox: ppe_schemas::BoundingBox::new(0.1, 0.1, 0.4, 0.4).unwrap(),
            metadata: HashMap::new(),
        });
        let summary = compliance_summary(&result);
        assert_eq!(summary.violations, vec!["no_helmet".to_string()]);
        assert_eq!(summary.compliant_items, vec!["helmet".to_string()]);
        assert!(summary.has_violations);
        assert_eq!(summary.violation_count, 1);
    }

    /// `max_pending=2` against an unreachable broker: the first two sends are
    /// enqueued (`Ok(true)`), the third is dropped at the pending bound
    /// (`Ok(false)`) without ever raising to the caller.
    #[tokio::test]
    async fn publish_drops_once_max_pending_is_reached() {
        let config = PublisherConfig {
            broker: crate::config::BrokerConfig {
                bootstrap_servers: "127.0.0.1:1".into(),
                security_protocol: crate::config::SecurityProtocol::Plaintext,
                sasl_mechanism: None,
                sasl_username: None,
                sasl_password: None,
            },
            topic: "ppe-results".into(),
            max_pending: 2,
            retries: 0,
            request_timeout: Duration::from_millis(100),
            enable_idempotence: false,
            linger: Duration::from_millis(0),
            compression_type: "none".into(),
            disconnect_flush_timeout: Duration::from_millis(100),
        };
        let publisher = Publisher::new(config, "ppe-inference");
        publisher.connect().expect("client creation does not dial the broker");

        let result = sample_result();
        assert_eq!(publisher.publish(&result, None, None).unwrap(), true);
        assert_eq!(publisher.publish(&result, None, None).unwrap(), true);
        assert_eq!(publisher.publish(&result, None, None).unwrap(), false);
    }

    #[test]
    fn publish_batch_before_connect_is_not_connected() {
        let config = PublisherConfig {
            broker: crate::config::BrokerConfig {
                bootstrap_servers: "localhost:9092".into(),
                security_protocol: crate::config::SecurityProtocol::Plaintext,
                sasl_mechanism: None,
                sasl_username: None,
                sasl_password: None,
            },
            topic: "ppe-results".into(),
            max_pending: 10,
            retries: 3,
            request_timeout: Duration::from_secs(5),
            enable_idempotence: false,
            linger: Duration::from_millis(5),
            compression_type: "none".into(),
            disconnect_flush_timeout: Duration::from_secs(10),
        };
        let publisher = Publisher::new(config, "ppe-inference");
        let results = vec![sample_result(), sample_result()];
        assert!(matches!(
            publisher.publish_batch(&results, None, None),
            Err(PublishError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn publish_batch_counts_successes_up_to_max_pending() {
        let config = PublisherConfig {
            broker: crate::config::BrokerConfig {
                bootstrap_servers: "127.0.0.1:1".into(),
                security_protocol: crate::config::SecurityProtocol::Plaintext,
                sasl_mechanism: None,
                sasl_username: None,
                sasl_password: None,
            },
            topic: "ppe-results".into(),
            max_pending: 2,
            retries: 0,
            request_timeout: Duration::from_millis(100),
            enable_idempotence: false,
            linger: Duration::from_millis(0),
            compression_type: "none".into(),
            disconnect_flush_timeout: Duration::from_millis(100),
        };
        let publisher = Publisher::new(config, "ppe-inference");
        publisher.connect().expect("client creation does not dial the broker");

        let results = vec![sample_result(), sample_result(), sample_result()];
        let successful = publisher
            .publish_batch(&results, None, None)
            .expect("connected publisher should not raise");
        assert_eq!(successful, 2);
    }
}

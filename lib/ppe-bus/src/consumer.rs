use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as RdConsumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, Headers, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::util::Timeout as RdTimeout;
use rdkafka::Message;
use serde_json::json;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::ConsumerConfig;
use crate::error::ConsumeError;

/// A single polled message, decoupled from rdkafka's borrowed-message
/// lifetime so handlers can hold onto it across an await point.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub timestamp_ms: Option<i64>,
    pub headers: HashMap<String, String>,
}

fn topic_partition_list(partitions: &[(String, i32)]) -> TopicPartitionList {
    let mut tpl = TopicPartitionList::new();
    for (topic, partition) in partitions {
        tpl.add_partition(topic, *partition);
    }
    tpl
}

/// Dispatch target for each polled record.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, record: &DeliveryRecord) -> Result<(), String>;

    /// Called when `handle` returns `Err`, before any DLQ publish. Default
    /// is a no-op; override for handler-specific alerting.
    async fn on_error(&self, _record: &DeliveryRecord, _error: &str) {}
}

/// Reliable, handler-dispatched polling loop with explicit offset commits
/// and DLQ fallback. Offset position is owned by the underlying broker
/// client and never touched outside `run`.
pub struct Consumer {
    config: ConsumerConfig,
    consumer: StdMutex<Option<StreamConsumer>>,
    dlq_producer: StdMutex<Option<FutureProducer>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Consumer {
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            config,
            consumer: StdMutex::new(None),
            dlq_producer: StdMutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Sets the subscription list, replacing any prior subscription. Builds
    /// the broker client (and, once, the DLQ producer) on the first call;
    /// later calls just re-subscribe the existing client to `topics`.
    pub fn subscribe(&self, topics: &[String]) -> Result<(), ConsumeError> {
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();

        let mut guard = self.consumer.lock().unwrap();
        if let Some(consumer) = guard.as_ref() {
            return consumer
                .subscribe(&topic_refs)
                .map_err(|err| ConsumeError::BrokerTransient {
                    message: err.to_string(),
                });
        }

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.config.broker.bootstrap_servers)
            .set(
                "security.protocol",
                self.config.broker.security_protocol.as_rdkafka_str(),
            )
            .set("group.id", &self.config.group_id)
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set(
                "enable.auto.commit",
                self.config.enable_auto_commit.to_string(),
            )
            .set(
                "session.timeout.ms",
                self.config.session_timeout.as_millis().to_string(),
            )
            .set(
                "heartbeat.interval.ms",
                self.config.heartbeat_interval.as_millis().to_string(),
            )
            .set(
                "max.poll.interval.ms",
                self.config.max_poll_interval.as_millis().to_string(),
            );

        if let Some(mechanism) = &self.config.broker.sasl_mechanism {
            client_config.set("sasl.mechanism", mechanism.as_rdkafka_str());
            if let Some(username) = &self.config.broker.sasl_username {
                client_config.set("sasl.username", username);
            }
            if let Some(password) = &self.config.broker.sasl_password {
                client_config.set("sasl.password", password);
            }
        }

        let consumer: StreamConsumer =
            client_config
                .create()
                .map_err(|err| ConsumeError::BrokerTransient {
                    message: err.to_string(),
                })?;
        consumer
            .subscribe(&topic_refs)
            .map_err(|err| ConsumeError::BrokerTransient {
                message: err.to_string(),
            })?;

        if let Some(dlq_topic) = &self.config.dlq_topic {
            let mut dlq_config = ClientConfig::new();
            dlq_config.set("bootstrap.servers", &self.config.broker.bootstrap_servers);
            dlq_config.set(
                "security.protocol",
                self.config.broker.security_protocol.as_rdkafka_str(),
            );
            let producer: FutureProducer =
                dlq_config
                    .create()
                    .map_err(|err| ConsumeError::BrokerTransient {
                        message: err.to_string(),
                    })?;
            *self.dlq_producer.lock().unwrap() = Some(producer);
        }

        *guard = Some(consumer);
        Ok(())
    }

    /// Blocks until `shutdown()` or a `SIGINT`/`SIGTERM`, dispatching each
    /// polled record to `handler`. Never returns `Err` for per-record
    /// failures — only a non-recoverable broker transport failure breaks the
    /// loop.
    pub async fn run(
        &self,
        handler: Arc<dyn Handler>,
        poll_timeout_sec: f64,
    ) -> Result<(), ConsumeError> {
        let consumer = self
            .consumer
            .lock()
            .unwrap()
            .clone()
            .ok_or(ConsumeError::BrokerTransient {
                message: "subscribe() was not called".into(),
            })?;

        self.running.store(true, Ordering::SeqCst);
        let poll_timeout = Duration::from_secs_f64(poll_timeout_sec.max(0.0));

        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let signal_task = tokio::spawn(async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("failed to install SIGINT handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate => {}
            }
            info!("consumer received shutdown signal");
            running.store(false, Ordering::SeqCst);
            shutdown.notify_one();
        });

        while self.running.load(Ordering::SeqCst) {
            let received = tokio::select! {
                _ = self.shutdown.notified() => {
                    break;
                }
                message = tokio::time::timeout(poll_timeout, consumer.recv()) => message,
            };

            let message = match received {
                Ok(message) => message,
                Err(_) => continue, // poll timeout, nothing ready
            };

            let borrowed = match message {
                Ok(borrowed) => borrowed,
                Err(KafkaError::PartitionEOF(partition)) => {
                    debug!(partition, "reached partition end");
                    continue;
                }
                Err(err) => {
                    warn!(%err, "broker error while polling");
                    continue;
                }
            };

            let record = DeliveryRecord {
                topic: borrowed.topic().to_string(),
                partition: borrowed.partition(),
                offset: borrowed.offset(),
                key: borrowed.key().map(|k| k.to_vec()),
                payload: borrowed.payload().map(|p| p.to_vec()).unwrap_or_default(),
                timestamp_ms: borrowed.timestamp().to_millis(),
                headers: borrowed
                    .headers()
                    .map(|headers| {
                        (0..headers.count())
                            .filter_map(|i| {
                                let header = headers.get(i);
                                let value = header.value?;
                                Some((
                                    header.key.to_string(),
                                    String::from_utf8_lossy(value).into_owned(),
                                ))
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            };

            match handler.handle(&record).await {
                Ok(()) => {
                    if !self.config.enable_auto_commit {
                        if let Err(err) = consumer.commit_message(&borrowed, CommitMode::Async) {
                            warn!(%err, "failed to commit offset");
                        }
                    }
                }
                Err(message) => {
                    handler.on_error(&record, &message).await;
                    if self.dlq_producer.lock().unwrap().is_some() {
                        self.send_to_dlq(&record, &message).await;
                    }
                }
            }
        }

        // Dropping/aborting the listener task de-registers its tokio::signal
        // hook, the async equivalent of restoring the prior handler.
        signal_task.abort();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_to_dlq(&self, record: &DeliveryRecord, error: &str) {
        let Some(dlq_topic) = self.config.dlq_topic.clone() else {
            return;
        };
        let producer = {
            let guard = self.dlq_producer.lock().unwrap();
            match guard.clone() {
                Some(producer) => producer,
                None => return,
            }
        };

        let truncated_error: String = error.chars().take(256).collect();
        let envelope = json!({
            "original_topic": record.topic,
            "original_message_base64": BASE64.encode(&record.payload),
            "error": error,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let Ok(bytes) = serde_json::to_vec(&envelope) else {
            error!("failed to encode DLQ envelope");
            return;
        };

        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "message-type",
                value: Some("dead_letter"),
            })
            .insert(Header {
                key: "original-topic",
                value: Some(record.topic.as_str()),
            })
            .insert(Header {
                key: "error-reason",
                value: Some(truncated_error.as_str()),
            });

        let key = uuid::Uuid::new_v4().to_string();
        let dlq_record = FutureRecord::to(&dlq_topic)
            .payload(&bytes)
            .key(&key)
            .headers(headers);

        if let Err((err, _)) = producer.send(dlq_record, RdTimeout::Never).await {
            error!(%err, original_topic = %record.topic, "failed to publish to DLQ");
        }
    }

    /// Synchronous offset commit.
    pub fn commit(&self) -> Result<(), ConsumeError> {
        let guard = self.consumer.lock().unwrap();
        let consumer = guard.as_ref().ok_or(ConsumeError::BrokerTransient {
            message: "subscribe() was not called".into(),
        })?;
        consumer
            .commit_consumer_state(CommitMode::Sync)
            .map_err(|err| ConsumeError::BrokerTransient {
                message: err.to_string(),
            })
    }

    /// Asynchronous (fire-and-forget) offset commit.
    pub fn commit_async(&self) -> Result<(), ConsumeError> {
        let guard = self.consumer.lock().unwrap();
        let consumer = guard.as_ref().ok_or(ConsumeError::BrokerTransient {
            message: "subscribe() was not called".into(),
        })?;
        consumer
            .commit_consumer_state(CommitMode::Async)
            .map_err(|err| ConsumeError::BrokerTransient {
                message: err.to_string(),
            })
    }

    /// Pass-through to the broker client: pauses delivery for exactly the
    /// given `(topic, partition)` pairs, not the full current assignment.
    pub fn pause(&self, partitions: &[(String, i32)]) -> Result<(), ConsumeError> {
        let guard = self.consumer.lock().unwrap();
        let consumer = guard.as_ref().ok_or(ConsumeError::BrokerTransient {
            message: "subscribe() was not called".into(),
        })?;
        let tpl = topic_partition_list(partitions);
        consumer
            .pause(&tpl)
            .map_err(|err| ConsumeError::BrokerTransient {
                message: err.to_string(),
            })
    }

    /// Pass-through to the broker client: resumes delivery for exactly the
    /// given `(topic, partition)` pairs.
    pub fn resume(&self, partitions: &[(String, i32)]) -> Result<(), ConsumeError> {
        let guard = self.consumer.lock().unwrap();
        let consumer = guard.as_ref().ok_or(ConsumeError::BrokerTransient {
            message: "subscribe() was not called".into(),
        })?;
        let tpl = topic_partition_list(partitions);
        consumer
            .resume(&tpl)
            .map_err(|err| ConsumeError::BrokerTransient {
                message: err.to_string(),
            })
    }

    /// Signals `run` to stop after its current poll cycle.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        async fn handle(&self, _record: &DeliveryRecord) -> Result<(), String> {
            Err("boom".into())
        }
    }

    #[test]
    fn dlq_envelope_truncates_long_errors() {
        let record = DeliveryRecord {
            topic: "ppe-raw-frames".into(),
            partition: 0,
            offset: 7,
            key: None,
            payload: b"original-bytes".to_vec(),
            timestamp_ms: Some(0),
            headers: HashMap::new(),
        };
        let long_error = "e".repeat(1000);
        let truncated: String = long_error.chars().take(256).collect();
        assert_eq!(truncated.len(), 256);

        let envelope = json!({
            "original_topic": record.topic,
            "original_message_base64": BASE64.encode(&record.payload),
            "error": long_error,
        });
        assert_eq!(envelope["original_topic"], "ppe-raw-frames");
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let config = ConsumerConfig {
            broker: crate::config::BrokerConfig {
                bootstrap_servers: "localhost:9092".into(),
                security_protocol: crate::config::SecurityProtocol::Plaintext,
                sasl_mechanism: None,
                sasl_username: None,
                sasl_password: None,
            },
            topics: vec!["ppe-raw-frames".into()],
            group_id: "ppe-inference".into(),
            auto_offset_reset: "earliest".into(),
            enable_auto_commit: false,
            session_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(3),
            max_poll_interval: Duration::from_secs(300),
            dlq_topic: Some("ppe-dlq".into()),
        };
        let consumer = Consumer::new(config);
        consumer.shutdown();
        consumer.shutdown();
        assert!(!consumer.running.load(Ordering::SeqCst));
        let _ = FailingHandler;
    }
}

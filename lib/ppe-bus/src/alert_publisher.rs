use std::sync::Mutex as StdMutex;

use ppe_schemas::Alert;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout as RdTimeout;
use snafu::ResultExt;

use crate::config::AlertPublisherConfig;
use crate::error::{EncodeSnafu, PublishError};

/// Higher-durability sibling of `Publisher`, used for safety-critical alerts.
/// Unlike `Publisher::publish`, `publish` here blocks until the broker has
/// durably accepted the message or the confirmation timeout elapses.
pub struct AlertPublisher {
    config: AlertPublisherConfig,
    producer: StdMutex<Option<FutureProducer>>,
}

impl AlertPublisher {
    pub fn new(config: AlertPublisherConfig) -> Self {
        Self {
            config,
            producer: StdMutex::new(None),
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
            .set("enable.idempotence", "true");

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

    pub fn disconnect(&self) {
        *self.producer.lock().unwrap() = None;
    }

    /// Blocks (up to `confirmation_timeout`) until the broker confirms
    /// durable acceptance of `alert`.
    pub async fn publish(&self, alert: &Alert) -> Result<(), PublishError> {
        let producer = {
            let guard = self.producer.lock().unwrap();
            guard.clone().ok_or(PublishError::NotConnected)?
        };

        let bytes = ppe_schemas::encode(alert).context(EncodeSnafu)?;
        let record = FutureRecord::to(&self.config.topic)
            .payload(&bytes)
            .key(&alert.alert_id);

        match tokio::time::timeout(
            self.config.confirmation_timeout,
            producer.send(record, RdTimeout::Never),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err((err, _))) => Err(PublishError::ConnectionFailed {
                message: err.to_string(),
            }),
            Err(_) => Err(PublishError::ConfirmationTimeout),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.producer.lock().unwrap().is_some()
    }
}

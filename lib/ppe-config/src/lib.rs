//! Layered settings: defaults, then an optional config file, then
//! environment variables prefixed `PPE_` with `__` as the nesting
//! delimiter (`PPE_KAFKA__BOOTSTRAP_SERVERS=...` sets `kafka.bootstrap_servers`).

use std::time::Duration;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum SettingsError {
    #[snafu(display("failed to build settings: {source}"))]
    Build { source: config::ConfigError },
    #[snafu(display("failed to deserialize settings: {source}"))]
    Deserialize { source: config::ConfigError },
    #[snafu(display("invalid settings: {reason}"))]
    Invalid { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Yolo,
    Onnx,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model_path: String,
    pub model_type: ModelType,
    pub device: String,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub batch_size: usize,
    #[serde(with = "duration_ms")]
    pub batch_timeout: Duration,
    pub half_precision: bool,
    pub gpu_memory_fraction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    #[serde(rename = "SASL_PLAINTEXT")]
    SaslPlaintext,
    #[serde(rename = "SASL_SSL")]
    SaslSsl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SaslMechanism {
    #[serde(rename = "PLAIN")]
    Plain,
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
    #[serde(rename = "OAUTHBEARER")]
    OAuthBearer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub results_topic: String,
    pub alerts_topic: String,
    pub raw_frames_topic: String,
    pub dlq_topic: Option<String>,
    pub consumer_group_id: String,
    pub security_protocol: SecurityProtocol,
    pub sasl_mechanism: Option<SaslMechanism>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub retries: u32,
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    pub enable_idempotence: bool,
    #[serde(with = "duration_ms")]
    pub linger: Duration,
    pub compression_type: String,
    pub auto_offset_reset: String,
    pub enable_auto_commit: bool,
    #[serde(with = "duration_ms")]
    pub session_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub heartbeat_interval: Duration,
    #[serde(with = "duration_ms")]
    pub max_poll_interval: Duration,
    pub max_pending: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub http_bind: String,
    pub grpc_bind: String,
    #[serde(with = "duration_ms")]
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service_name: String,
    pub model: ModelConfig,
    pub kafka: KafkaConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads defaults, then an optional file at `path` (if it exists), then
    /// `PPE_`-prefixed environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder()
            .set_default("service_name", "ppe-inference")
            .context(BuildSnafu)?
            .set_default("model.model_type", "yolo")
            .context(BuildSnafu)?
            .set_default("model.device", "cuda:0")
            .context(BuildSnafu)?
            .set_default("model.confidence_threshold", 0.5)
            .context(BuildSnafu)?
            .set_default("model.iou_threshold", 0.45)
            .context(BuildSnafu)?
            .set_default("model.max_detections", 100)
            .context(BuildSnafu)?
            .set_default("model.batch_size", 8)
            .context(BuildSnafu)?
            .set_default("model.batch_timeout", 50)
            .context(BuildSnafu)?
            .set_default("model.half_precision", true)
            .context(BuildSnafu)?
            .set_default("model.gpu_memory_fraction", 0.8)
            .context(BuildSnafu)?
            .set_default("kafka.results_topic", "ppe-results")
            .context(BuildSnafu)?
            .set_default("kafka.alerts_topic", "ppe-alerts")
            .context(BuildSnafu)?
            .set_default("kafka.raw_frames_topic", "ppe-raw-frames")
            .context(BuildSnafu)?
            .set_default("kafka.consumer_group_id", "ppe-inference")
            .context(BuildSnafu)?
            .set_default("kafka.security_protocol", "PLAINTEXT")
            .context(BuildSnafu)?
            .set_default("kafka.retries", 3)
            .context(BuildSnafu)?
            .set_default("kafka.request_timeout", 30_000)
            .context(BuildSnafu)?
            .set_default("kafka.enable_idempotence", true)
            .context(BuildSnafu)?
            .set_default("kafka.linger", 5)
            .context(BuildSnafu)?
            .set_default("kafka.compression_type", "snappy")
            .context(BuildSnafu)?
            .set_default("kafka.auto_offset_reset", "earliest")
            .context(BuildSnafu)?
            .set_default("kafka.enable_auto_commit", false)
            .context(BuildSnafu)?
            .set_default("kafka.session_timeout", 10_000)
            .context(BuildSnafu)?
            .set_default("kafka.heartbeat_interval", 3_000)
            .context(BuildSnafu)?
            .set_default("kafka.max_poll_interval", 300_000)
            .context(BuildSnafu)?
            .set_default("kafka.max_pending", 1_000)
            .context(BuildSnafu)?
            .set_default("server.http_bind", "0.0.0.0:8080")
            .context(BuildSnafu)?
            .set_default("server.grpc_bind", "0.0.0.0:50051")
            .context(BuildSnafu)?
            .set_default("server.shutdown_grace", 5_000)
            .context(BuildSnafu)?
            .set_default("logging.level", "info")
            .context(BuildSnafu)?
            .set_default("logging.format", "console")
            .context(BuildSnafu)?;

        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        let built = builder
            .add_source(
                config::Environment::with_prefix("PPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context(BuildSnafu)?;

        let settings: Settings = built.try_deserialize().context(DeserializeSnafu)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.model.batch_size == 0 || self.model.batch_size > 64 {
            return InvalidSnafu {
                reason: format!(
                    "model.batch_size must be in 1..=64, got {}",
                    self.model.batch_size
                ),
            }
            .fail();
        }
        if !(0.0..=1.0).contains(&self.model.confidence_threshold) {
            return InvalidSnafu {
                reason: "model.confidence_threshold must be in [0, 1]".to_string(),
            }
            .fail();
        }
        if !(0.0..=1.0).contains(&self.model.iou_threshold) {
            return InvalidSnafu {
                reason: "model.iou_threshold must be in [0, 1]".to_string(),
            }
            .fail();
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_without_a_file() {
        let settings = Settings::load(None).expect("defaults should be self-consistent");
        assert_eq!(settings.model.batch_size, 8);
        assert_eq!(settings.kafka.results_topic, "ppe-results");
        assert_eq!(settings.logging.format, LogFormat::Console);
    }

    #[test]
    fn rejects_out_of_range_confidence_threshold() {
        std::env::set_var("PPE_MODEL__CONFIDENCE_THRESHOLD", "1.5");
        let result = Settings::load(None);
        std::env::remove_var("PPE_MODEL__CONFIDENCE_THRESHOLD");
        assert!(matches!(result, Err(SettingsError::Invalid { .. })));
    }
}

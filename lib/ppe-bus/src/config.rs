use std::time::Duration;

/// Security settings shared by `Publisher`, `AlertPublisher` and `Consumer`
/// client construction, mirroring the original's `SecurityProtocol`/
/// `SaslMechanism` enums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecurityProtocol {
    #[default]
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn as_rdkafka_str(&self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
    OAuthBearer,
}

impl SaslMechanism {
    pub fn as_rdkafka_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
            SaslMechanism::OAuthBearer => "OAUTHBEARER",
        }
    }
}

/// Broker connection settings common to both producer flavours.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub bootstrap_servers: String,
    pub security_protocol: SecurityProtocol,
    pub sasl_mechanism: Option<SaslMechanism>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
}

/// Tuning for `Publisher` (C3).
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub broker: BrokerConfig,
    pub topic: String,
    pub max_pending: usize,
    pub retries: u32,
    pub request_timeout: Duration,
    pub enable_idempotence: bool,
    pub linger: Duration,
    pub compression_type: String,
    pub disconnect_flush_timeout: Duration,
}

/// Tuning for `AlertPublisher` (C4): same shape, higher durability defaults.
#[derive(Debug, Clone)]
pub struct AlertPublisherConfig {
    pub broker: BrokerConfig,
    pub topic: String,
    pub max_pending: usize,
    pub retries: u32,
    pub request_timeout: Duration,
    pub confirmation_timeout: Duration,
}

/// Tuning for `Consumer` (C6).
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub broker: BrokerConfig,
    pub topics: Vec<String>,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub enable_auto_commit: bool,
    pub session_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub max_poll_interval: Duration,
    pub dlq_topic: Option<String>,
}

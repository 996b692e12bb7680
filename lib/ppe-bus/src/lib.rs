//! Message-bus egress (`Publisher`, `AlertPublisher`) and ingress
//! (`Consumer`) around `rdkafka`. The egress side implements
//! `ppe_batcher::ResultSink`, so a `Publisher` can be handed straight to a
//! `Batcher` without either crate depending on the other's concrete types.

mod alert_publisher;
mod config;
mod consumer;
mod error;
mod publisher;

pub use alert_publisher::AlertPublisher;
pub use config::{
    AlertPublisherConfig, BrokerConfig, ConsumerConfig, PublisherConfig, SaslMechanism,
    SecurityProtocol,
};
pub use consumer::{Consumer, DeliveryRecord, Handler};
pub use error::{ConsumeError, PublishError};
pub use publisher::{Publisher, PublisherHealth};

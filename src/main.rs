mod api;
mod app_state;
mod cli;
mod grpc;
mod image_decode;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ppe_batcher::{Batcher, BatcherConfig};
use ppe_bus::{
    BrokerConfig, PublisherConfig, SaslMechanism as BusSaslMechanism,
    SecurityProtocol as BusSecurityProtocol,
};
use ppe_config::Settings;
use ppe_detector::synthetic::SyntheticDetector;
use ppe_detector::Detector;
use ppe_lifecycle::LifecycleCoordinator;
use tracing::{error, info};

use crate::app_state::{AppState, ModelMetadata};
use crate::cli::Cli;

fn convert_security_protocol(protocol: ppe_config::SecurityProtocol) -> BusSecurityProtocol {
    match protocol {
        ppe_config::SecurityProtocol::Plaintext => BusSecurityProtocol::Plaintext,
        ppe_config::SecurityProtocol::Ssl => BusSecurityProtocol::Ssl,
        ppe_config::SecurityProtocol::SaslPlaintext => BusSecurityProtocol::SaslPlaintext,
        ppe_config::SecurityProtocol::SaslSsl => BusSecurityProtocol::SaslSsl,
    }
}

fn convert_sasl_mechanism(mechanism: ppe_config::SaslMechanism) -> BusSaslMechanism {
    match mechanism {
        ppe_config::SaslMechanism::Plain => BusSaslMechanism::Plain,
        ppe_config::SaslMechanism::ScramSha256 => BusSaslMechanism::ScramSha256,
        ppe_config::SaslMechanism::ScramSha512 => BusSaslMechanism::ScramSha512,
        ppe_config::SaslMechanism::OAuthBearer => BusSaslMechanism::OAuthBearer,
    }
}

fn broker_config(settings: &Settings) -> BrokerConfig {
    BrokerConfig {
        bootstrap_servers: settings.kafka.bootstrap_servers.clone(),
        security_protocol: convert_security_protocol(settings.kafka.security_protocol),
        sasl_mechanism: settings.kafka.sasl_mechanism.map(convert_sasl_mechanism),
        sasl_username: settings.kafka.sasl_username.clone(),
        sasl_password: settings.kafka.sasl_password.clone(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let log_level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    telemetry::init_tracing(log_level, settings.logging.format);
    let metrics_handle = telemetry::init_metrics();

    info!(service = %settings.service_name, "starting ppe-inference");

    let detector: Arc<dyn Detector> = Arc::new(SyntheticDetector::new());

    let batcher_config = BatcherConfig::new(
        settings.model.batch_size,
        settings.model.batch_timeout,
    )?;
    let publisher = Arc::new(ppe_bus::Publisher::new(
        PublisherConfig {
            broker: broker_config(&settings),
            topic: settings.kafka.results_topic.clone(),
            max_pending: settings.kafka.max_pending,
            retries: settings.kafka.retries,
            request_timeout: settings.kafka.request_timeout,
            enable_idempotence: settings.kafka.enable_idempotence,
            linger: settings.kafka.linger,
            compression_type: settings.kafka.compression_type.clone(),
            disconnect_flush_timeout: Duration::from_secs(10),
        },
        settings.service_name.clone(),
    ));
    let batcher = Arc::new(Batcher::with_sink(
        detector.clone(),
        batcher_config,
        Some(publisher.clone() as Arc<dyn ppe_batcher::ResultSink>),
    ));

    let lifecycle = Arc::new(LifecycleCoordinator::new(
        detector.clone(),
        batcher.clone(),
        Some(publisher.clone()),
        settings.model.batch_size,
        settings.server.shutdown_grace,
    ));

    lifecycle.start().await?;

    let state = AppState {
        detector,
        batcher,
        publisher: Some(publisher),
        lifecycle: lifecycle.clone(),
        model: ModelMetadata {
            model_id: settings.model.model_path.clone(),
            model_version: "1".to_string(),
        },
        service_name: settings.service_name.clone(),
        metrics_handle,
    };

    let app = api::routes().with_state(state);
    let listener = tokio::net::TcpListener::bind(&settings.server.http_bind).await?;
    info!(addr = %settings.server.http_bind, "http server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        error!(%err, "http server exited with error");
    }

    lifecycle.stop().await;
    Ok(())
}

async fn shutdown_signal() {
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
    info!("shutdown signal received");
}

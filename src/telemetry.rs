use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ppe_config::LogFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Installs a `tracing` subscriber driven by `RUST_LOG` (falling back to
/// `level`), switching between a human-readable layer (development) and a
/// JSON layer (production) per `logging.format`.
pub fn init_tracing(level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = Registry::default().with(env_filter);

    match format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Console => {
            registry
                .with(tracing_subscriber::fmt::layer().with_ansi(true))
                .init();
        }
    }
}

/// Installs the process-global Prometheus recorder and returns the handle
/// used by `GET /metrics` to render the exposition text.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

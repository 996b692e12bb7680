use clap::Parser;

/// GPU-accelerated PPE detection service.
#[derive(Debug, Parser)]
#[command(name = "ppe-inference", version, about)]
pub struct Cli {
    /// Path to a YAML settings file (optional — defaults and environment
    /// variables still apply if absent).
    #[arg(long, env = "PPE_CONFIG_FILE")]
    pub config: Option<String>,

    /// Overrides `logging.level` for this run.
    #[arg(long, env = "PPE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: Level,
    pub with_thread_ids: bool,
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            with_thread_ids: true,
            with_ansi: true,
        }
    }
}

/// Initializes tracing output for the service. `RUST_LOG` overrides the
/// default filter, which keeps sqlx and rdkafka at warn.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.unwrap_or_default();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let filter_str = "product_events=".to_string()
            + &config.log_level.to_string()
            + ",sqlx=warn,rdkafka=warn";
        EnvFilter::new(filter_str)
    });

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(config.with_thread_ids)
        .with_level(true)
        .with_ansi(config.with_ansi);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

mod application;
mod domain;
mod infrastructure;

use crate::infrastructure::dlq::DeadLetterQueue;
use crate::infrastructure::downstream::HttpDownstreamService;
use crate::infrastructure::kafka_abstraction::{KafkaConsumer, KafkaProducer};
use crate::infrastructure::ledger::PostgresProcessedEventStore;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::pipeline::{KafkaEventPipeline, ProductEventProcessor};
use crate::infrastructure::retry::{RetryConfig, RetryController};
use crate::infrastructure::shutdown::{listen_for_ctrl_c, ShutdownSignal};
use crate::infrastructure::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging(None).map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let config = AppConfig::from_env();
    info!("Starting product events consumer service");

    let ledger = PostgresProcessedEventStore::connect(&config.database_url, 10).await?;
    ledger.init_schema().await?;

    let producer = Arc::new(KafkaProducer::new(config.kafka.clone())?);
    let consumer = KafkaConsumer::new(config.kafka.clone())?;

    let dlq = Arc::new(DeadLetterQueue::new(
        producer.clone(),
        config.kafka.dead_letter_topic.clone(),
    ));
    let downstream = Arc::new(HttpDownstreamService::new(
        &config.downstream_url,
        Duration::from_millis(config.downstream_timeout_ms),
    )?);
    let retry = RetryController::new(RetryConfig {
        max_attempts: config.retry_max_attempts,
        backoff: Duration::from_millis(config.retry_backoff_ms),
    });

    let processor = Arc::new(ProductEventProcessor::new(
        Arc::new(ledger),
        downstream,
        dlq,
        retry,
    ));
    let pipeline = KafkaEventPipeline::new(consumer, processor);

    let (signal, shutdown_rx) = ShutdownSignal::new();
    tokio::spawn(listen_for_ctrl_c(signal));

    pipeline.run(shutdown_rx).await
}

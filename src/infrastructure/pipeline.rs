use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use rdkafka::consumer::stream_consumer::StreamPartitionQueue;
use rdkafka::message::{BorrowedMessage, Headers, Message};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::domain::ProductCreatedEvent;
use crate::infrastructure::codec;
use crate::infrastructure::dlq::{DeadLetterMessage, DeadLetterQueue};
use crate::infrastructure::downstream::DownstreamService;
use crate::infrastructure::errors::ProcessingError;
use crate::infrastructure::kafka_abstraction::{
    BrokerError, KafkaConsumer, LoggingConsumerContext, MESSAGE_ID_HEADER,
};
use crate::infrastructure::ledger::{InsertOutcome, ProcessedEventStore};
use crate::infrastructure::retry::RetryController;

/// One received broker record, detached from the consumer so a delivery
/// episode can outlive the poll that produced it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: Option<String>,
    pub message_key: String,
    pub payload: Vec<u8>,
}

impl Delivery {
    fn from_message(msg: &BorrowedMessage<'_>) -> Self {
        let message_id = msg.headers().and_then(|headers| {
            headers
                .iter()
                .find(|h| h.key == MESSAGE_ID_HEADER)
                .and_then(|h| h.value)
                .map(|v| String::from_utf8_lossy(v).into_owned())
        });
        let message_key = msg
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default();
        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        Self {
            message_id,
            message_key,
            payload,
        }
    }
}

/// Terminal state of a delivery episode. Every outcome is acknowledged to the
/// broker; only a failed dead-letter publish leaves the offset uncommitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// Downstream call performed and ledger record written.
    Processed,
    /// Duplicate delivery, suppressed by the ledger.
    Skipped,
    /// Routed to the dead-letter topic.
    DeadLettered,
}

/// Orchestrates one delivery episode:
/// receive -> decode -> dedup pre-check -> downstream call -> ledger write.
///
/// Broker-agnostic on purpose; the partition workers in
/// [`KafkaEventPipeline`] feed it detached [`Delivery`] values.
pub struct ProductEventProcessor {
    ledger: Arc<dyn ProcessedEventStore>,
    downstream: Arc<dyn DownstreamService>,
    dlq: Arc<DeadLetterQueue>,
    retry: RetryController,
}

impl ProductEventProcessor {
    pub fn new(
        ledger: Arc<dyn ProcessedEventStore>,
        downstream: Arc<dyn DownstreamService>,
        dlq: Arc<DeadLetterQueue>,
        retry: RetryController,
    ) -> Self {
        Self {
            ledger,
            downstream,
            dlq,
            retry,
        }
    }

    /// Runs one delivery episode to a terminal state.
    ///
    /// Returns an error only when the dead-letter publish itself fails, in
    /// which case the caller must not commit the offset so the broker
    /// redelivers the message.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Result<EpisodeOutcome, BrokerError> {
        let Some(message_id) = delivery.message_id.clone() else {
            self.dead_letter(delivery, &ProcessingError::MissingMessageId, 0)
                .await?;
            return Ok(EpisodeOutcome::DeadLettered);
        };

        let event = match codec::decode(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                self.dead_letter(delivery, &ProcessingError::from(e), 0)
                    .await?;
                return Ok(EpisodeOutcome::DeadLettered);
            }
        };

        info!(message_id = %message_id, title = %event.title, "Received event");

        // Fast-path pre-check. A latency optimization only: two concurrent
        // attempts for the same id can both see `false`, so the insert below
        // remains the authoritative gate.
        match self.ledger.exists(&message_id).await {
            Ok(true) => {
                info!(message_id = %message_id, "Duplicate message id");
                return Ok(EpisodeOutcome::Skipped);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    message_id = %message_id,
                    "ledger pre-check failed, continuing to authoritative insert: {}", e
                );
            }
        }

        let result = self
            .retry
            .run("process product event", {
                let downstream = self.downstream.clone();
                let ledger = self.ledger.clone();
                let event = event.clone();
                let message_id = message_id.clone();
                let message_key = delivery.message_key.clone();
                move || {
                    let downstream = downstream.clone();
                    let ledger = ledger.clone();
                    let event = event.clone();
                    let message_id = message_id.clone();
                    let message_key = message_key.clone();
                    async move {
                        process_once(&*downstream, &*ledger, &event, &message_id, &message_key)
                            .await
                    }
                }
            })
            .await;

        match result {
            Ok((InsertOutcome::Inserted, _)) => {
                info!(message_id = %message_id, product_id = %event.product_id, "event processed");
                Ok(EpisodeOutcome::Processed)
            }
            Ok((InsertOutcome::AlreadyExists, _)) => {
                // Lost the race against a concurrent attempt for the same id.
                info!(message_id = %message_id, "ledger insert conflict, treating as duplicate");
                Ok(EpisodeOutcome::Skipped)
            }
            Err((e, attempts)) => {
                self.dead_letter(delivery, &e, attempts).await?;
                Ok(EpisodeOutcome::DeadLettered)
            }
        }
    }

    async fn dead_letter(
        &self,
        delivery: &Delivery,
        error: &ProcessingError,
        attempt_count: u32,
    ) -> Result<(), BrokerError> {
        let message = DeadLetterMessage {
            message_id: delivery.message_id.clone(),
            message_key: delivery.message_key.clone(),
            payload: delivery.payload.clone(),
            failure_reason: error.to_string(),
            error_kind: error.kind(),
            attempt_count,
            original_timestamp: Utc::now(),
        };
        self.dlq.publish(&message).await
    }
}

/// The non-dedup-gated portion of an episode: the external side effect plus
/// the ledger write. Retried as a unit, so a transient ledger failure after a
/// successful call re-invokes the call; redelivery semantics already allow
/// that, and the ledger write is what makes it stop.
async fn process_once(
    downstream: &dyn DownstreamService,
    ledger: &dyn ProcessedEventStore,
    event: &ProductCreatedEvent,
    message_id: &str,
    message_key: &str,
) -> Result<InsertOutcome, ProcessingError> {
    downstream.invoke(event).await?;
    let outcome = ledger
        .insert_if_absent(message_id, message_key, Utc::now())
        .await?;
    Ok(outcome)
}

/// Runs one sequential worker per partition against a shared group consumer.
///
/// Per-key ordering holds because a retry episode blocks only its own
/// partition's worker; other partitions keep flowing.
pub struct KafkaEventPipeline {
    consumer: KafkaConsumer,
    processor: Arc<ProductEventProcessor>,
}

impl KafkaEventPipeline {
    pub fn new(consumer: KafkaConsumer, processor: Arc<ProductEventProcessor>) -> Self {
        Self { consumer, processor }
    }

    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.consumer.subscribe()?;

        let partitions = self.consumer.config().partitions;
        let mut workers = Vec::with_capacity(partitions as usize);
        for partition in 0..partitions {
            let queue = self.consumer.split_partition_queue(partition).ok_or_else(|| {
                anyhow::anyhow!("failed to split queue for partition {}", partition)
            })?;
            workers.push(tokio::spawn(partition_worker(
                partition,
                queue,
                self.consumer.clone(),
                self.processor.clone(),
                shutdown.clone(),
            )));
        }

        // All partitions are split off; the shared consumer still has to be
        // polled to serve rebalances and heartbeats.
        let driver = self.consumer.inner();
        let mut driver_shutdown = shutdown.clone();
        let driver_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = driver_shutdown.changed() => break,
                    msg = driver.recv() => match msg {
                        Ok(m) => warn!(
                            partition = m.partition(),
                            "main consumer queue unexpectedly received a message"
                        ),
                        Err(e) => error!("consumer error: {}", e),
                    }
                }
            }
        });

        for (partition, worker) in workers.into_iter().enumerate() {
            log_worker_exit(partition as i32, worker.await);
        }
        driver_task.abort();
        info!("consumer pipeline stopped");
        Ok(())
    }
}

/// A dead partition stops consuming until the next rebalance, so a worker
/// task that did not exit cleanly must be visible in the logs.
fn log_worker_exit(partition: i32, result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            error!(partition, "partition worker panicked: {}", e);
        }
        Err(e) => {
            error!(partition, "partition worker aborted: {}", e);
        }
    }
}

async fn partition_worker(
    partition: i32,
    queue: StreamPartitionQueue<LoggingConsumerContext>,
    consumer: KafkaConsumer,
    processor: Arc<ProductEventProcessor>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(partition, "partition worker started");
    loop {
        // The shutdown check sits only at the receive point, so an in-flight
        // delivery episode always runs to its terminal state first.
        let received = tokio::select! {
            _ = shutdown.changed() => break,
            msg = queue.recv() => msg,
        };

        let msg = match received {
            Ok(msg) => msg,
            Err(e) => {
                error!(partition, "failed to receive message: {}", e);
                continue;
            }
        };

        let delivery = Delivery::from_message(&msg);
        let offset = msg.offset();
        drop(msg);

        match processor.handle_delivery(&delivery).await {
            Ok(outcome) => {
                info!(partition, offset, ?outcome, "delivery episode finished");
                if let Err(e) = consumer.acknowledge(partition, offset) {
                    error!(partition, offset, "failed to commit offset: {}", e);
                }
            }
            Err(e) => {
                // Dead-letter publish failed. Leave the offset uncommitted so
                // the broker redelivers; the dedup gate absorbs any repeat of
                // the side effect.
                error!(
                    partition,
                    offset, "dead-letter publish failed, offset left uncommitted: {}", e
                );
            }
        }
    }
    info!(partition, "partition worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_worker_join_is_reported_without_propagating() {
        let handle = tokio::spawn(async { panic!("worker died") });
        let result = handle.await;
        assert!(matches!(&result, Err(e) if e.is_panic()));
        // Must absorb the join error rather than unwinding the run loop.
        log_worker_exit(0, result);
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    client::ClientContext,
    config::ClientConfig,
    consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer},
    message::{Header, OwnedHeaders},
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use thiserror::Error;

use crate::infrastructure::config::KafkaConfig;

/// Name of the message header carrying the idempotency key.
pub const MESSAGE_ID_HEADER: &str = "messageId";

#[derive(Debug, Error, Clone)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Producer error: {0}")]
    Producer(String),
    #[error("Consumer error: {0}")]
    Consumer(String),
    #[error("Broker error: {0}")]
    Other(String),
}

impl From<rdkafka::error::KafkaError> for BrokerError {
    fn from(error: rdkafka::error::KafkaError) -> Self {
        match error {
            rdkafka::error::KafkaError::ClientCreation(e) => BrokerError::Connection(e),
            rdkafka::error::KafkaError::MessageProduction(e) => {
                BrokerError::Producer(e.to_string())
            }
            rdkafka::error::KafkaError::MessageConsumption(e) => {
                BrokerError::Consumer(e.to_string())
            }
            _ => BrokerError::Other(error.to_string()),
        }
    }
}

/// Broker-acknowledged position of a published record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    pub partition: i32,
    pub offset: i64,
}

/// Narrow publish seam over the broker client.
///
/// `publish` resolves only once the broker has acknowledged the write under
/// the producer's ack policy; a successful return means the record is
/// durable. Exactly one append is attempted per call.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        message_id: &str,
        payload: &[u8],
    ) -> Result<PublishAck, BrokerError>;
}

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    config: KafkaConfig,
}

impl KafkaProducer {
    pub fn new(config: KafkaConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("acks", &config.producer_acks)
            .set(
                "enable.idempotence",
                config.producer_enable_idempotence.to_string(),
            )
            .set(
                "max.in.flight.requests.per.connection",
                config.producer_max_in_flight.to_string(),
            )
            .set("linger.ms", config.producer_linger_ms.to_string())
            .set("request.timeout.ms", config.request_timeout_ms.to_string())
            .set(
                "delivery.timeout.ms",
                config.delivery_timeout_ms.to_string(),
            )
            .create()?;

        Ok(Self { producer, config })
    }
}

#[async_trait]
impl EventPublisher for KafkaProducer {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        message_id: &str,
        payload: &[u8],
    ) -> Result<PublishAck, BrokerError> {
        let headers = OwnedHeaders::new().insert(Header {
            key: MESSAGE_ID_HEADER,
            value: Some(message_id.as_bytes()),
        });

        let (partition, offset) = self
            .producer
            .send(
                FutureRecord::to(topic)
                    .key(key)
                    .payload(payload)
                    .headers(headers),
                Timeout::After(Duration::from_millis(self.config.send_timeout_ms)),
            )
            .await
            .map_err(|(e, _)| BrokerError::Producer(e.to_string()))?;

        Ok(PublishAck { partition, offset })
    }
}

pub struct LoggingConsumerContext;

impl ClientContext for LoggingConsumerContext {}

impl ConsumerContext for LoggingConsumerContext {
    fn pre_rebalance(
        &self,
        _consumer: &rdkafka::consumer::BaseConsumer<Self>,
        rebalance: &Rebalance,
    ) {
        tracing::info!("Pre-rebalance: {:?}", rebalance);
    }

    fn post_rebalance(
        &self,
        _consumer: &rdkafka::consumer::BaseConsumer<Self>,
        rebalance: &Rebalance,
    ) {
        tracing::info!("Post-rebalance: {:?}", rebalance);
    }
}

pub type LoggingConsumer = StreamConsumer<LoggingConsumerContext>;

/// Subscribing side of the broker seam. Offsets are stored and committed
/// manually, only after a delivery episode reaches a terminal state.
#[derive(Clone)]
pub struct KafkaConsumer {
    consumer: Arc<LoggingConsumer>,
    config: KafkaConfig,
}

impl KafkaConsumer {
    pub fn new(config: KafkaConfig) -> Result<Self, BrokerError> {
        let consumer: LoggingConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("client.id", &config.client_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.partition.eof", "false")
            .set(
                "session.timeout.ms",
                config.consumer_session_timeout_ms.to_string(),
            )
            .set(
                "heartbeat.interval.ms",
                config.consumer_heartbeat_interval_ms.to_string(),
            )
            .set(
                "max.poll.interval.ms",
                config.consumer_max_poll_interval_ms.to_string(),
            )
            .set("partition.assignment.strategy", "cooperative-sticky")
            .create_with_context(LoggingConsumerContext)?;

        Ok(Self {
            consumer: Arc::new(consumer),
            config,
        })
    }

    pub fn subscribe(&self) -> Result<(), BrokerError> {
        self.consumer.subscribe(&[&self.config.topic])?;
        tracing::info!("Subscribed to topic: {}", self.config.topic);
        Ok(())
    }

    /// Detaches the stream for one partition so a dedicated worker can own
    /// it. The shared consumer must still be driven via [`Self::inner`] for
    /// rebalances and group liveness.
    pub fn split_partition_queue(
        &self,
        partition: i32,
    ) -> Option<rdkafka::consumer::stream_consumer::StreamPartitionQueue<LoggingConsumerContext>>
    {
        self.consumer
            .split_partition_queue(&self.config.topic, partition)
    }

    pub fn inner(&self) -> Arc<LoggingConsumer> {
        self.consumer.clone()
    }

    /// Marks `offset` on `partition` as processed and commits. Called only
    /// once the delivery episode for that offset is terminal.
    pub fn acknowledge(&self, partition: i32, offset: i64) -> Result<(), BrokerError> {
        self.consumer
            .store_offset(&self.config.topic, partition, offset)?;
        self.consumer.commit_consumer_state(CommitMode::Async)?;
        Ok(())
    }

    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }
}

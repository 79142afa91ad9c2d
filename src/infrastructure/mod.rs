pub mod codec;
pub mod config;
pub mod dlq;
pub mod downstream;
pub mod errors;
pub mod kafka_abstraction;
pub mod ledger;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod shutdown;

pub use config::{AppConfig, KafkaConfig};
pub use dlq::{DeadLetterMessage, DeadLetterQueue};
pub use downstream::{DownstreamError, DownstreamService, HttpDownstreamService};
pub use errors::{ErrorKind, ProcessingError};
pub use kafka_abstraction::{BrokerError, EventPublisher, KafkaConsumer, KafkaProducer, PublishAck};
pub use ledger::{InsertOutcome, LedgerError, PostgresProcessedEventStore, ProcessedEventStore};
pub use pipeline::{Delivery, EpisodeOutcome, KafkaEventPipeline, ProductEventProcessor};
pub use retry::{RetryConfig, RetryController};

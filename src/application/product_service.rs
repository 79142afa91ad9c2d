use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::domain::{CreateProduct, ProductCreatedEvent, ProductError};
use crate::infrastructure::codec::{self, CodecError};
use crate::infrastructure::kafka_abstraction::{BrokerError, EventPublisher};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid product: {0}")]
    Invalid(#[from] ProductError),
    #[error("failed to encode event: {0}")]
    Encode(#[from] CodecError),
    #[error("broker rejected publish: {0}")]
    Broker(#[from] BrokerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProduct {
    pub product_id: String,
    pub message_id: String,
}

/// Publishing side of the pipeline.
///
/// Each call builds one envelope and performs exactly one broker append,
/// blocking until the broker acknowledges the write. It never retries; a
/// duplicate publish is the caller's decision to make.
pub struct ProductService {
    producer: Arc<dyn EventPublisher>,
    topic: String,
}

impl ProductService {
    pub fn new(producer: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    pub async fn create_product(
        &self,
        command: CreateProduct,
    ) -> Result<CreatedProduct, PublishError> {
        command.validate()?;

        let product_id = Uuid::new_v4();
        let event = ProductCreatedEvent::new(
            product_id,
            command.title,
            command.price,
            command.quantity,
        );
        let message_id = self.publish(&event).await?;

        info!(product_id = %product_id, "product created");
        Ok(CreatedProduct {
            product_id: product_id.to_string(),
            message_id,
        })
    }

    /// Publishes one event and returns the freshly generated message id.
    ///
    /// The message id identifies the logical event, not a send attempt: a
    /// caller that publishes the same event twice produces two distinct ids,
    /// and both deliveries carry real side effects downstream.
    pub async fn publish(&self, event: &ProductCreatedEvent) -> Result<String, PublishError> {
        let message_id = Uuid::new_v4().to_string();
        let key = event.partition_key();
        let payload = codec::encode(event)?;

        let ack = self
            .producer
            .publish(&self.topic, &key, &message_id, &payload)
            .await?;

        info!("Topic: {}", self.topic);
        info!("Partition: {}", ack.partition);
        info!("Offset: {}", ack.offset);

        Ok(message_id)
    }
}

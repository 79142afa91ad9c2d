pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{ProductService, PublishError};
pub use domain::{CreateProduct, ProductCreatedEvent, ProductError};
pub use infrastructure::{
    AppConfig, DeadLetterQueue, KafkaConfig, KafkaConsumer, KafkaProducer, ProductEventProcessor,
    RetryConfig,
};

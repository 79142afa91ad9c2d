use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::infrastructure::codec;
use crate::infrastructure::errors::ErrorKind;
use crate::infrastructure::kafka_abstraction::{BrokerError, EventPublisher};

/// Envelope preserved on the dead-letter topic: the original payload plus the
/// failure context that exhausted or bypassed retry.
///
/// The payload is kept byte-for-byte. Decode failures are the most common
/// reason to land here, and those payloads need not be valid UTF-8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    pub message_id: Option<String>,
    pub message_key: String,
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    pub failure_reason: String,
    pub error_kind: ErrorKind,
    pub attempt_count: u32,
    pub original_timestamp: DateTime<Utc>,
}

mod base64_payload {
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Terminal sink for messages whose processing cannot succeed within policy.
pub struct DeadLetterQueue {
    producer: Arc<dyn EventPublisher>,
    topic: String,
}

impl DeadLetterQueue {
    pub fn new(producer: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    pub async fn publish(&self, message: &DeadLetterMessage) -> Result<(), BrokerError> {
        let payload = codec::encode_value(message)
            .map_err(|e| BrokerError::Producer(e.to_string()))?;

        // Dead letters of headerless messages still need a message id header.
        let message_id = message
            .message_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.producer
            .publish(&self.topic, &message.message_key, &message_id, &payload)
            .await?;

        warn!(
            message_id = %message_id,
            attempts = message.attempt_count,
            reason = %message.failure_reason,
            "message routed to dead-letter topic"
        );
        Ok(())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_non_utf8_payload_bytes() {
        let original_bytes = vec![0xff, 0xfe, 0x00, 0x80];
        let message = DeadLetterMessage {
            message_id: Some(Uuid::new_v4().to_string()),
            message_key: "key-1".to_string(),
            payload: original_bytes.clone(),
            failure_reason: "malformed event payload".to_string(),
            error_kind: ErrorKind::NonRetryable,
            attempt_count: 0,
            original_timestamp: Utc::now(),
        };

        let encoded = codec::encode_value(&message).unwrap();
        let decoded: DeadLetterMessage = codec::decode_value(&encoded).unwrap();
        assert_eq!(decoded.payload, original_bytes);
    }
}

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::domain::ProductCreatedEvent;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serializes a domain event to its JSON wire representation.
pub fn encode(event: &ProductCreatedEvent) -> Result<Vec<u8>, CodecError> {
    encode_value(event)
}

/// Deserializes a wire payload back into the domain event.
///
/// Malformed input is reported as `CodecError`; it never panics. The consumer
/// pipeline treats a decode failure as non-retryable, since a bad payload
/// cannot self-heal through redelivery.
pub fn decode(payload: &[u8]) -> Result<ProductCreatedEvent, CodecError> {
    decode_value(payload)
}

pub fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode_value<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_event() -> ProductCreatedEvent {
        ProductCreatedEvent::new(Uuid::new_v4(), "Samsung".to_string(), dec!(600), 1)
    }

    #[test]
    fn encode_decode_round_trip() {
        let event = sample_event();
        let payload = encode(&event).unwrap();
        let decoded = decode(&payload).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn wire_format_uses_camel_case_field_names() {
        let event = sample_event();
        let payload = encode(&event).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert!(json.get("productId").is_some());
        assert_eq!(json["title"], "Samsung");
        assert_eq!(json["quantity"], 1);
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        assert!(decode(b"not json at all").is_err());
        assert!(decode(b"{\"title\": \"missing fields\"}").is_err());
        assert!(decode(b"").is_err());
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain event emitted once per successfully created product.
///
/// All fields are fixed at construction time; the event is serialized once by
/// the publisher and never mutated after the send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreatedEvent {
    pub product_id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl ProductCreatedEvent {
    pub fn new(product_id: Uuid, title: String, price: Decimal, quantity: u32) -> Self {
        Self {
            product_id,
            title,
            price,
            quantity,
        }
    }

    /// Natural identifier of the subject entity, used as the partition key
    /// so all events for one product land on the same partition.
    pub fn partition_key(&self) -> String {
        self.product_id.to_string()
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("Product title must not be empty")]
    EmptyTitle,
    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),
}

/// Request to create a product, as handed to the publisher by the ingress
/// layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProduct {
    pub title: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl CreateProduct {
    pub fn new(title: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            title: title.into(),
            price,
            quantity,
        }
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.title.trim().is_empty() {
            return Err(ProductError::EmptyTitle);
        }
        if self.price <= Decimal::ZERO {
            return Err(ProductError::InvalidPrice(self.price));
        }
        if self.quantity == 0 {
            return Err(ProductError::InvalidQuantity(self.quantity));
        }
        Ok(())
    }
}

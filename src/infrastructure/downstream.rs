use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::ProductCreatedEvent;

/// Failure of the side-effecting external call made during processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DownstreamError {
    /// The dependency could not be reached at all: connection refused,
    /// request timeout, DNS failure. Transient by nature.
    #[error("downstream unreachable: {0}")]
    NetworkUnavailable(String),
    /// The dependency was reachable but rejected the request. Permanent for
    /// this message.
    #[error("downstream rejected request with status {status}")]
    RejectedByPeer { status: u16 },
}

/// External action required to process a product event.
///
/// Implementations must not retry internally; the retry controller owns the
/// attempt count.
#[async_trait]
pub trait DownstreamService: Send + Sync {
    async fn invoke(&self, event: &ProductCreatedEvent) -> Result<(), DownstreamError>;
}

pub struct HttpDownstreamService {
    client: reqwest::Client,
    url: String,
}

impl HttpDownstreamService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DownstreamService for HttpDownstreamService {
    async fn invoke(&self, event: &ProductCreatedEvent) -> Result<(), DownstreamError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DownstreamError::NetworkUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownstreamError::RejectedByPeer {
                status: status.as_u16(),
            });
        }

        info!(
            product_id = %event.product_id,
            status = status.as_u16(),
            "downstream call succeeded"
        );
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::codec::CodecError;
use crate::infrastructure::downstream::DownstreamError;
use crate::infrastructure::ledger::LedgerError;

/// Retry eligibility of a processing failure.
///
/// The mapping in [`ProcessingError::kind`] is the single source of truth:
/// nothing downstream of it re-interprets an error's retryability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Retryable,
    NonRetryable,
}

/// Failure raised while processing one delivery of a product event.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to decode event payload: {0}")]
    Decode(#[from] CodecError),
    #[error("downstream call failed: {0}")]
    Downstream(#[from] DownstreamError),
    #[error("idempotency ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),
    #[error("message is missing the messageId header")]
    MissingMessageId,
}

impl ProcessingError {
    /// Classifies the error. Connectivity failures are retryable; data and
    /// contract failures are not. The mapping is total: anything not known to
    /// be transient defaults to non-retryable so an unexpected failure can
    /// never retry forever.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::Downstream(DownstreamError::NetworkUnavailable(_)) => {
                ErrorKind::Retryable
            }
            ProcessingError::Ledger(LedgerError::Storage(_)) => ErrorKind::Retryable,
            _ => ErrorKind::NonRetryable,
        }
    }
}

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::infrastructure::errors::{ErrorKind, ProcessingError};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(3000),
        }
    }
}

/// Bounded fixed-backoff re-delivery of a failing processing step.
///
/// Attempt counting lives here and nowhere else; the downstream adapter and
/// the ledger never retry internally. Waiting between attempts suspends only
/// the calling partition worker.
#[derive(Clone, Debug)]
pub struct RetryController {
    config: RetryConfig,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `operation` until it succeeds, fails non-retryably, or the
    /// attempt budget is spent. Returns the value and the number of attempts
    /// used, or the final error and the attempts consumed by it.
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<(T, u32), (ProcessingError, u32)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProcessingError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match operation().await {
                Ok(value) => return Ok((value, attempts)),
                Err(e) => {
                    if e.kind() == ErrorKind::NonRetryable {
                        error!(
                            "Operation '{}' failed non-retryably on attempt {}: {}",
                            operation_name, attempts, e
                        );
                        return Err((e, attempts));
                    }
                    if attempts >= self.config.max_attempts {
                        error!(
                            "Operation '{}' failed after {} attempts: {}",
                            operation_name, attempts, e
                        );
                        return Err((e, attempts));
                    }
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {}. Retrying in {}ms...",
                        operation_name,
                        attempts,
                        self.config.max_attempts,
                        e,
                        self.config.backoff.as_millis()
                    );
                    sleep(self.config.backoff).await;
                }
            }
        }
    }
}

//! Request-scoped deadlines around storage calls

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::domain::DomainError;

/// Upper bound on how long a single storage call may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageDeadline {
    limit: Duration,
}

impl StorageDeadline {
    pub const DEFAULT_MS: u64 = 5_000;

    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Run `future`, turning an elapsed deadline into a retryable error
    pub async fn run<T, F>(&self, operation: &str, future: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match timeout(self.limit, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation = operation,
                    timeout_ms = self.limit.as_millis() as u64,
                    "Storage call timed out"
                );
                Err(DomainError::unavailable(format!(
                    "{} timed out after {}ms",
                    operation,
                    self.limit.as_millis()
                )))
            }
        }
    }
}

impl Default for StorageDeadline {
    fn default() -> Self {
        Self::from_millis(Self::DEFAULT_MS)
    }
}

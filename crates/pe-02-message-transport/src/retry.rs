//! Retryable ledger tasks.

use crate::error::{TransportError, TransportResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempt budget and pause between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Run `task` until it succeeds, fails with a non-recoverable error,
    /// or the budget is spent.
    pub async fn run<T, F, Fut>(&self, name: &str, mut task: F) -> TransportResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match task().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_recoverable() => return Err(err),
                Err(err) if attempt >= self.attempts => {
                    return Err(TransportError::RetriesExhausted {
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(task = name, attempt, error = %err, "[pe-02] retrying");
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

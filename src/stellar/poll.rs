//! Wait loop for submitted transactions
//!
//! After submission the RPC node reports `NOT_FOUND` until the transaction is
//! applied. The loop re-queries on a configurable schedule until the status
//! becomes terminal or the optional deadline passes.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{OracleError, Result};
use crate::stellar::rpc::{GetTransactionResponse, TransactionStatus};

/// Anything that can report the settlement status of a transaction hash
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionStatusSource: Send + Sync {
    async fn transaction_status(&self, hash: &str) -> Result<GetTransactionResponse>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first re-query
    pub interval: Duration,
    /// Growth of the delay after each unobserved poll; 1.0 keeps it fixed
    pub backoff_factor: f64,
    pub max_interval: Duration,
    /// `None` waits until the process is terminated
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(30),
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl PollPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        if self.backoff_factor <= 1.0 {
            return current;
        }
        current
            .mul_f64(self.backoff_factor)
            .min(self.max_interval.max(self.interval))
    }
}

/// Poll until the transaction leaves the not-found state.
///
/// Returns the first response whose status is not `NOT_FOUND`; the caller
/// decides what a non-success status means.
pub async fn wait_for_transaction<S>(
    source: &S,
    hash: &str,
    policy: &PollPolicy,
) -> Result<GetTransactionResponse>
where
    S: TransactionStatusSource + ?Sized,
{
    let started = Instant::now();
    let mut delay = policy.interval;
    let mut attempts = 0u32;

    loop {
        debug!(hash, attempts, "waiting for transaction to be confirmed...");
        let response = source.transaction_status(hash).await?;
        attempts += 1;

        if response.status != TransactionStatus::NotFound {
            debug!(hash, status = ?response.status, attempts, "transaction observed");
            return Ok(response);
        }

        if let Some(timeout) = policy.timeout {
            let elapsed = started.elapsed();
            if elapsed + delay > timeout {
                return Err(OracleError::PollTimeout {
                    hash: hash.to_string(),
                    waited_secs: elapsed.as_secs(),
                });
            }
        }

        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

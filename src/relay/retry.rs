use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{RelayError, RelayResult};
use crate::monitoring::metrics::record_retry;

pub type RetryClassifier = fn(&RelayError) -> bool;

/// 显式重试策略：最多尝试 `max_attempts` 次，仅对分类器认可的错误退避重试。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    name: &'static str,
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: u32,
    is_retryable: RetryClassifier,
}

impl RetryPolicy {
    pub fn new(
        name: &'static str,
        max_attempts: u32,
        initial_backoff: Duration,
        multiplier: u32,
        is_retryable: RetryClassifier,
    ) -> Self {
        Self {
            name,
            max_attempts: max_attempts.max(1),
            initial_backoff,
            multiplier: multiplier.max(1),
            is_retryable,
        }
    }

    /// 网络抖动：首次之外再重试 `retries` 次，退避时间逐次翻倍。
    pub fn network(retries: u32, initial_backoff: Duration) -> Self {
        Self::new(
            "network",
            retries.saturating_add(1),
            initial_backoff,
            2,
            RelayError::is_transient_network,
        )
    }

    /// 前一笔交易的账户尚未落地：固定间隔轮询。
    pub fn pending_account(attempts: u32, interval: Duration) -> Self {
        Self::new(
            "pending_account",
            attempts,
            interval,
            1,
            RelayError::is_pending_account,
        )
    }

    pub fn network_from_config(config: &RetryConfig) -> Self {
        Self::network(
            config.network_retries,
            Duration::from_millis(config.network_backoff_ms),
        )
    }

    pub fn pending_account_from_config(config: &RetryConfig) -> Self {
        Self::pending_account(
            config.pending_account_attempts,
            Duration::from_millis(config.pending_account_interval_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> RelayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RelayResult<T>>,
    {
        let mut attempt = 1;
        let mut backoff = self.initial_backoff;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && (self.is_retryable)(&err) => {
                    warn!(
                        target: "relay::retry",
                        policy = self.name,
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err.describe(),
                        "可重试错误，退避后重试"
                    );
                    record_retry(self.name, operation);
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(self.multiplier);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

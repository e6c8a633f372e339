//! 中继后端 HTTP 接口。

mod client;
pub mod serde_helpers;
pub mod types;

use async_trait::async_trait;
use reqwest::StatusCode;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use thiserror::Error;

use crate::context::UsageStatus;
use crate::error::RelayResult;

pub use client::RelayApiClient;
pub use types::{RelayTransactionRequest, SwapDataPayload, TopUpSignatures, TopUpWithSwapRequest};

#[derive(Debug, Error)]
pub enum RelayApiError {
    #[error("中继后端请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("请求 {endpoint} 超时（{timeout_ms}ms）")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("响应解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("请求 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("中继后端拒绝请求（code={code}）: {message}")]
    Backend {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },
    #[error("中继后端响应结构不符合预期: {0}")]
    Schema(String),
}

impl RelayApiError {
    pub fn describe(&self) -> String {
        use std::error::Error as _;
        let mut parts = vec![self.to_string()];
        let mut current = self.source();
        while let Some(err) = current {
            let text = err.to_string();
            if parts.last().map(|last| last == &text).unwrap_or(false) {
                current = err.source();
                continue;
            }
            parts.push(text);
            current = err.source();
        }
        if let Self::Backend {
            data: Some(data), ..
        } = self
        {
            parts.push(data.to_string());
        }
        parts.join(" | caused by: ")
    }
}

/// 中继后端：提供 fee payer、免费额度，并代付/代签交易。
#[async_trait]
pub trait RelayBackend: Send + Sync {
    async fn fee_payer_address(&self) -> RelayResult<Pubkey>;

    async fn usage_status(&self, owner: &Pubkey) -> RelayResult<UsageStatus>;

    /// 后端补签并上链，返回交易签名。
    async fn relay_transaction(&self, transaction: &Transaction) -> RelayResult<String>;

    /// 后端只补 fee payer 签名，返回该签名。
    async fn sign_relay_transaction(&self, transaction: &Transaction) -> RelayResult<String>;

    async fn relay_top_up_with_swap(&self, request: &TopUpWithSwapRequest) -> RelayResult<String>;
}

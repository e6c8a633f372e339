use std::fmt;

use solana_client::client_error::ClientError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::SignerError;
use thiserror::Error;

use crate::api::RelayApiError;

const TOO_MANY_INSTRUCTIONS: &str = "too many instructions";
const CONNECTION_CLOSED: &str = "connection closed before message completed";
const INVALID_ACCOUNT_DATA: &str = "invalid account data for instruction";
const ACCOUNT_NOT_FOUND: &str = "AccountNotFound";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("中继上下文未加载或已失效")]
    InvalidContext,
    #[error("缺少可用的签名密钥")]
    Unauthorized,
    #[error("池子报价无法给出有效的输入/输出数量")]
    InvalidAmount,
    #[error("未找到可用的兑换路径: {from} -> {to}")]
    SwapPoolsNotFound { from: Pubkey, to: Pubkey },
    #[error("两跳兑换缺少可解析的中转代币 mint")]
    TransitTokenMintNotFound,
    #[error("交易 fee payer 与上下文不一致: 期望 {expected}，实际 {actual}")]
    InvalidFeePayer { expected: Pubkey, actual: Pubkey },
    #[error("签名后缺少账户 {0} 的签名")]
    InvalidSignature(Pubkey),
    #[error("充值交易 {top_up_signature} 已提交，但中继交易失败: {source}")]
    ToppedUpButRelayFailed {
        top_up_signature: String,
        #[source]
        source: Box<RelayError>,
    },
    #[error("兑换池数量非法: {0}（仅支持 1 或 2）")]
    InvalidPoolCount(usize),
    #[error("RPC 请求失败: {0}")]
    Rpc(#[from] ClientError),
    #[error("中继后端请求失败: {0}")]
    Api(#[from] RelayApiError),
    #[error("指令构建失败: {0}")]
    Instruction(String),
    #[error("交易签名失败: {0}")]
    Signer(#[from] SignerError),
    #[error("链上交易执行失败: {0}")]
    TransactionFailed(String),
    #[error("等待 {0} 超时")]
    Timeout(String),
    #[error("配置缺失或非法: {0}")]
    InvalidConfig(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub fn instruction(reason: impl fmt::Display) -> Self {
        Self::Instruction(reason.to_string())
    }

    /// 拼接完整的错误链，便于日志排障与错误分类。
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
        parts.join(" | caused by: ")
    }

    /// 可以按网络抖动处理的错误：后端偶发的指令数量拒绝与连接提前关闭。
    pub fn is_transient_network(&self) -> bool {
        let text = self.describe();
        text.contains(TOO_MANY_INSTRUCTIONS) || text.contains(CONNECTION_CLOSED)
    }

    /// 前一笔交易的副作用（例如账户创建）尚未落地导致的链上校验失败。
    pub fn is_pending_account(&self) -> bool {
        let text = self.describe();
        text.contains(INVALID_ACCOUNT_DATA) || text.contains(ACCOUNT_NOT_FOUND)
    }

    /// 充值是否已经发生（资金已消耗）。
    pub fn is_topped_up(&self) -> bool {
        matches!(self, Self::ToppedUpButRelayFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_network_errors() {
        let err = RelayError::TransactionFailed(
            "hyper: connection closed before message completed".into(),
        );
        assert!(err.is_transient_network());
        assert!(!err.is_pending_account());

        let err = RelayError::Instruction("transaction rejected: too many instructions".into());
        assert!(err.is_transient_network());
    }

    #[test]
    fn classifies_pending_account_errors() {
        let err = RelayError::TransactionFailed(
            "Error processing Instruction 2: invalid account data for instruction".into(),
        );
        assert!(err.is_pending_account());
        assert!(!err.is_transient_network());
    }

    #[test]
    fn topped_up_failure_keeps_inner_error() {
        let err = RelayError::ToppedUpButRelayFailed {
            top_up_signature: "sig".into(),
            source: Box::new(RelayError::InvalidAmount),
        };
        assert!(err.is_topped_up());
        let described = err.describe();
        assert!(described.contains("sig"));
        assert!(described.contains("caused by"));
    }
}

//! 链上 RPC 访问抽象。

mod client;

use async_trait::async_trait;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::error::RelayResult;

pub use client::RpcChainClient;

/// 中继流程所需的最小链上接口。
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn minimum_balance_for_rent_exemption(&self, span: usize) -> RelayResult<u64>;

    /// 当前网络每个签名收取的 lamports。
    async fn lamports_per_signature(&self) -> RelayResult<u64>;

    async fn recent_blockhash(&self) -> RelayResult<Hash>;

    /// 账户不存在时返回 `None`。
    async fn account_info(&self, address: &Pubkey) -> RelayResult<Option<Account>>;

    /// 绕过中继后端直接上链。中继流程本身只经 `RelayBackend` 提交，
    /// 此方法留给自行承担手续费的调用方，例如用户钱包签好的普通交易。
    async fn send_transaction(&self, transaction: &Transaction) -> RelayResult<Signature>;

    async fn wait_for_confirmation(&self, signature: &Signature) -> RelayResult<()>;
}

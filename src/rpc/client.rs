use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::{RelayError, RelayResult};

use super::ChainClient;

const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct RpcChainClient {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    send_config: RpcSendTransactionConfig,
    confirmation_timeout: Duration,
}

impl RpcChainClient {
    pub fn new(client: Arc<RpcClient>, confirmation_timeout: Duration) -> Self {
        let commitment = CommitmentConfig::confirmed();
        let send_config = RpcSendTransactionConfig {
            preflight_commitment: Some(commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };
        Self {
            client,
            commitment,
            send_config,
            confirmation_timeout,
        }
    }

    pub fn from_url(url: impl Into<String>, confirmation_timeout: Duration) -> Self {
        let client = RpcClient::new_with_commitment(url.into(), CommitmentConfig::confirmed());
        Self::new(Arc::new(client), confirmation_timeout)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn minimum_balance_for_rent_exemption(&self, span: usize) -> RelayResult<u64> {
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(span)
            .await?)
    }

    async fn lamports_per_signature(&self) -> RelayResult<u64> {
        // 单签名空消息的费用即为当前签名费率。
        let blockhash = self.client.get_latest_blockhash().await?;
        let payer = Pubkey::new_unique();
        let message = Message::new_with_blockhash(&[], Some(&payer), &blockhash);
        Ok(self.client.get_fee_for_message(&message).await?)
    }

    async fn recent_blockhash(&self) -> RelayResult<Hash> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn account_info(&self, address: &Pubkey) -> RelayResult<Option<Account>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> RelayResult<Signature> {
        let signature = self
            .client
            .send_transaction_with_config(transaction, self.send_config.clone())
            .await?;
        info!(
            target: "relay::rpc",
            signature = %signature,
            endpoint = %self.client.url(),
            "交易已通过 RPC 直接提交"
        );
        Ok(signature)
    }

    async fn wait_for_confirmation(&self, signature: &Signature) -> RelayResult<()> {
        let started = Instant::now();
        loop {
            match self.client.get_signature_status(signature).await? {
                Some(Ok(())) => {
                    debug!(
                        target: "relay::rpc",
                        signature = %signature,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "交易已确认"
                    );
                    return Ok(());
                }
                Some(Err(err)) => {
                    return Err(RelayError::TransactionFailed(format!(
                        "{signature}: {err}"
                    )));
                }
                None => {}
            }
            if started.elapsed() >= self.confirmation_timeout {
                return Err(RelayError::Timeout(format!("交易 {signature} 确认")));
            }
            sleep(CONFIRMATION_POLL_INTERVAL).await;
        }
    }
}

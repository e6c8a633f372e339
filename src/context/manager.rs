use std::sync::Arc;

use parking_lot::RwLock;
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::RelayBackend;
use crate::error::{RelayError, RelayResult};
use crate::instructions::relay::RelayProgram;
use crate::relay::RetryPolicy;
use crate::rpc::ChainClient;

use super::{RelayAccountStatus, RelayContext};

/// 中继账户按 0 字节账户计算租金豁免余额。
const RELAY_ACCOUNT_SPAN: usize = 0;

/// 持有当前 `RelayContext` 快照；更新时整体替换，读者永远看到完整快照。
pub struct RelayContextManager {
    owner: Pubkey,
    relay_program: RelayProgram,
    chain: Arc<dyn ChainClient>,
    backend: Arc<dyn RelayBackend>,
    retry: RetryPolicy,
    current: RwLock<Option<Arc<RelayContext>>>,
    update_lock: Mutex<()>,
}

impl RelayContextManager {
    pub fn new(
        owner: Pubkey,
        relay_program: RelayProgram,
        chain: Arc<dyn ChainClient>,
        backend: Arc<dyn RelayBackend>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            owner,
            relay_program,
            chain,
            backend,
            retry,
            current: RwLock::new(None),
            update_lock: Mutex::new(()),
        }
    }

    pub fn owner(&self) -> Pubkey {
        self.owner
    }

    /// 并发拉取全部字段后一次性提交新快照；任一查询失败时保留旧快照。
    pub async fn update(&self) -> RelayResult<Arc<RelayContext>> {
        let _guard = self.update_lock.lock().await;
        let context = Arc::new(self.retry.run("relay_context.update", || self.fetch()).await?);
        *self.current.write() = Some(context.clone());
        info!(
            target: "relay::context",
            owner = %self.owner,
            fee_payer = %context.fee_payer_address,
            lamports_per_signature = context.lamports_per_signature,
            relay_account = ?context.relay_account_status,
            current_usage = context.usage_status.current_usage,
            max_usage = context.usage_status.max_usage,
            "中继上下文已更新"
        );
        Ok(context)
    }

    pub fn current_context(&self) -> RelayResult<Arc<RelayContext>> {
        self.current
            .read()
            .as_ref()
            .cloned()
            .ok_or(RelayError::InvalidContext)
    }

    /// 没有快照时先执行一次 `update`。
    pub async fn current_or_update(&self) -> RelayResult<Arc<RelayContext>> {
        match self.current_context() {
            Ok(context) => Ok(context),
            Err(RelayError::InvalidContext) => self.update().await,
            Err(err) => Err(err),
        }
    }

    /// 重新拉取并比较非易变字段，用于发现后端侧的状态漂移。
    pub async fn validate(&self) -> RelayResult<bool> {
        let current = self.current_context()?;
        let fresh = self.retry.run("relay_context.validate", || self.fetch()).await?;
        let unchanged = current.same_state(&fresh);
        if !unchanged {
            warn!(
                target: "relay::context",
                owner = %self.owner,
                cached = ?current.relay_account_status,
                fresh = ?fresh.relay_account_status,
                "中继上下文已漂移，需要重新 update"
            );
        }
        Ok(unchanged)
    }

    /// 乐观地在本地累加免费额度使用量，避免与后端计数发生读写竞争。
    pub async fn record_usage(&self, fee: u64) -> RelayResult<()> {
        let _guard = self.update_lock.lock().await;
        let mut slot = self.current.write();
        let current = slot.as_ref().ok_or(RelayError::InvalidContext)?;
        let mut next = current.as_ref().clone();
        next.usage_status.record(fee);
        debug!(
            target: "relay::context",
            current_usage = next.usage_status.current_usage,
            amount_used = next.usage_status.amount_used,
            "本地记录免费额度使用"
        );
        *slot = Some(Arc::new(next));
        Ok(())
    }

    async fn fetch(&self) -> RelayResult<RelayContext> {
        let relay_address = self.relay_program.relay_address(&self.owner);
        let (
            minimum_token_account_balance,
            minimum_relay_account_balance,
            lamports_per_signature,
            fee_payer_address,
            relay_account,
            usage_status,
        ) = tokio::try_join!(
            self.chain
                .minimum_balance_for_rent_exemption(spl_token::state::Account::LEN),
            self.chain
                .minimum_balance_for_rent_exemption(RELAY_ACCOUNT_SPAN),
            self.chain.lamports_per_signature(),
            self.backend.fee_payer_address(),
            self.chain.account_info(&relay_address),
            self.backend.usage_status(&self.owner),
        )?;

        Ok(RelayContext {
            minimum_token_account_balance,
            minimum_relay_account_balance,
            fee_payer_address,
            lamports_per_signature,
            relay_account_status: RelayAccountStatus::from_balance(
                relay_account.map(|account| account.lamports),
            ),
            usage_status,
        })
    }
}

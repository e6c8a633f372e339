//! 充值并中继：按需把支付代币兑换为 SOL 充入中继账户，再附加报销指令提交交易。

mod retry;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use solana_sdk::instruction::Instruction;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_system_interface::instruction as system_instruction;
use tracing::{info, warn};

use crate::api::{RelayApiClient, RelayApiError, RelayBackend};
use crate::config::RelayConfig;
use crate::context::{RelayContext, RelayContextManager};
use crate::error::{RelayError, RelayResult};
use crate::fee::{FeeAmount, calculate_needed_top_up_amount};
use crate::identity::RelayIdentity;
use crate::instructions::{RelayProgram, WSOL_MINT};
use crate::monitoring::metrics::{record_relay, record_top_up};
use crate::router::PoolRouter;
use crate::rpc::{ChainClient, RpcChainClient};
use crate::swap::{
    SwapTransactionBuilder, SwapTransactionOutput, SwapTransactionRequest, TopUpTransactionBuilder,
    TransferAuthority,
};
use crate::transaction::{PreparedTransaction, TokenAccount};

pub use retry::{RetryClassifier, RetryPolicy};

/// 完整中继由后端提交；仅签名模式只取回 fee payer 签名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayMode {
    #[default]
    Relay,
    SignatureOnly,
}

impl RelayMode {
    fn label(self) -> &'static str {
        match self {
            Self::Relay => "relay",
            Self::SignatureOnly => "signature_only",
        }
    }
}

/// 待中继的交易及其额外报销金额。
#[derive(Debug, Clone)]
pub struct RelayItem {
    pub transaction: PreparedTransaction,
    pub additional_payback_fee: u64,
}

impl RelayItem {
    pub fn new(transaction: PreparedTransaction) -> Self {
        Self {
            transaction,
            additional_payback_fee: 0,
        }
    }

    /// 额外报销记在最后一笔（主交易）上。
    pub fn from_swap_output(output: SwapTransactionOutput) -> Vec<Self> {
        let mut items: Vec<Self> = output.transactions.into_iter().map(Self::new).collect();
        if let Some(main) = items.last_mut() {
            main.additional_payback_fee = output.additional_payback_fee;
        }
        items
    }
}

#[derive(Debug, Clone)]
pub struct RelayerOptions {
    pub slippage: f64,
    pub transfer_authority: TransferAuthority,
    pub network_retry: RetryPolicy,
    pub pending_account_retry: RetryPolicy,
}

impl RelayerOptions {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            slippage: config.swap.slippage,
            transfer_authority: if config.swap.delegate_transfer_authority {
                TransferAuthority::Delegate
            } else {
                TransferAuthority::Owner
            },
            network_retry: RetryPolicy::network_from_config(&config.retry),
            pending_account_retry: RetryPolicy::pending_account_from_config(&config.retry),
        }
    }
}

pub struct FeeRelayer {
    identity: RelayIdentity,
    relay_program: RelayProgram,
    chain: Arc<dyn ChainClient>,
    backend: Arc<dyn RelayBackend>,
    context: RelayContextManager,
    swap_builder: SwapTransactionBuilder,
    top_up_builder: TopUpTransactionBuilder,
    options: RelayerOptions,
}

impl FeeRelayer {
    pub fn new(
        identity: RelayIdentity,
        relay_program: RelayProgram,
        chain: Arc<dyn ChainClient>,
        backend: Arc<dyn RelayBackend>,
        router: Arc<dyn PoolRouter>,
        options: RelayerOptions,
    ) -> Self {
        let context = RelayContextManager::new(
            identity.pubkey,
            relay_program,
            chain.clone(),
            backend.clone(),
            options.network_retry.clone(),
        );
        let swap_builder = SwapTransactionBuilder::new(relay_program, chain.clone(), router.clone())
            .with_transfer_authority(options.transfer_authority);
        let top_up_builder = TopUpTransactionBuilder::new(relay_program, chain.clone(), router);
        Self {
            identity,
            relay_program,
            chain,
            backend,
            context,
            swap_builder,
            top_up_builder,
            options,
        }
    }

    /// 按配置组装 RPC、后端客户端与签名身份；AMM 路由由调用方提供。
    pub fn from_config(config: &RelayConfig, router: Arc<dyn PoolRouter>) -> RelayResult<Self> {
        config.validate()?;
        let identity = RelayIdentity::from_wallet(&config.wallet)?;
        let relay_program = config.network.relay_program()?;
        let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::from_url(
            config.network.rpc_url.clone(),
            Duration::from_millis(config.timeouts.confirmation_ms),
        ));
        let backend: Arc<dyn RelayBackend> =
            Arc::new(RelayApiClient::from_config(&config.network, &config.timeouts)?);
        info!(
            target: "relay::orchestrator",
            owner = %identity.pubkey,
            relay_program = %relay_program.id(),
            rpc_url = %config.network.rpc_url,
            relay_api_url = %config.network.relay_api_url,
            "fee relayer 已初始化"
        );
        Ok(Self::new(
            identity,
            relay_program,
            chain,
            backend,
            router,
            RelayerOptions::from_config(config),
        ))
    }

    pub fn identity(&self) -> &RelayIdentity {
        &self.identity
    }

    pub fn context(&self) -> &RelayContextManager {
        &self.context
    }

    pub fn swap_builder(&self) -> &SwapTransactionBuilder {
        &self.swap_builder
    }

    pub async fn update_context(&self) -> RelayResult<Arc<RelayContext>> {
        self.context.update().await
    }

    /// 基于当前上下文构建兑换交易。
    pub async fn build_swap(
        &self,
        request: SwapTransactionRequest,
    ) -> RelayResult<SwapTransactionOutput> {
        let context = self.context.current_or_update().await?;
        self.swap_builder.build(&context, request).await
    }

    /// 构建兑换交易并以 `paying_fee_token` 支付手续费中继。
    pub async fn relay_swap(
        &self,
        request: SwapTransactionRequest,
        paying_fee_token: &TokenAccount,
        mode: RelayMode,
    ) -> RelayResult<Vec<String>> {
        let output = self.build_swap(request).await?;
        self.top_up_and_relay(RelayItem::from_swap_output(output), paying_fee_token, mode)
            .await
    }

    /// 按需充值后依次中继；多笔交易之间等待上链确认（仅签名模式除外）。
    pub async fn top_up_and_relay(
        &self,
        mut items: Vec<RelayItem>,
        paying_fee_token: &TokenAccount,
        mode: RelayMode,
    ) -> RelayResult<Vec<String>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let context = self.context.current_or_update().await?;
        let expected_fee: FeeAmount = items.iter().map(|item| item.transaction.expected_fee).sum();

        let top_up_signature = self
            .top_up_if_needed(&context, expected_fee, paying_fee_token, mode)
            .await?;

        match self.relay_items(&mut items, paying_fee_token, mode).await {
            Ok(signatures) => Ok(signatures),
            Err(err) => match top_up_signature {
                Some(top_up_signature) => {
                    warn!(
                        target: "relay::orchestrator",
                        top_up_signature = %top_up_signature,
                        error = %err.describe(),
                        "充值已完成但中继失败，请重新查询余额后再重试"
                    );
                    Err(RelayError::ToppedUpButRelayFailed {
                        top_up_signature,
                        source: Box::new(err),
                    })
                }
                None => Err(err),
            },
        }
    }

    async fn top_up_if_needed(
        &self,
        context: &RelayContext,
        expected_fee: FeeAmount,
        paying_fee_token: &TokenAccount,
        mode: RelayMode,
    ) -> RelayResult<Option<String>> {
        if paying_fee_token.mint == WSOL_MINT {
            return Ok(None);
        }
        let needed = calculate_needed_top_up_amount(context, expected_fee, &paying_fee_token.mint);
        if needed.is_zero() {
            return Ok(None);
        }

        let params = self
            .top_up_builder
            .prepare(context, &paying_fee_token.mint, needed)
            .await?;
        let blockhash = self.chain.recent_blockhash().await?;
        let top_up = self
            .top_up_builder
            .build(
                context,
                &self.identity.signer,
                *paying_fee_token,
                &params,
                self.options.slippage,
                blockhash,
            )
            .await?;
        let request = top_up.request(&self.identity.pubkey)?;

        let submitted = self
            .options
            .network_retry
            .run("relay.top_up", || self.backend.relay_top_up_with_swap(&request))
            .await;
        let signature = match submitted {
            Ok(signature) => signature,
            Err(err) => {
                record_top_up("error", needed.total());
                return Err(err);
            }
        };
        record_top_up("success", needed.total());
        self.context
            .record_usage(top_up.prepared.expected_fee.transaction_fee)
            .await?;
        info!(
            target: "relay::orchestrator",
            signature = %signature,
            needed_transaction_fee = needed.transaction_fee,
            needed_account_creation_fee = needed.account_creation_fee,
            "充值兑换已提交"
        );

        if mode == RelayMode::Relay {
            self.wait_for_confirmation(&signature).await?;
        }
        Ok(Some(signature))
    }

    async fn relay_items(
        &self,
        items: &mut [RelayItem],
        paying_fee_token: &TokenAccount,
        mode: RelayMode,
    ) -> RelayResult<Vec<String>> {
        let total = items.len();
        let mut signatures = Vec::with_capacity(total);
        for (index, item) in items.iter_mut().enumerate() {
            let context = self.context.current_context()?;
            let payback = self.payback_instructions(&context, item, paying_fee_token)?;
            item.transaction.append_instructions(payback);
            let transaction = item.transaction.sign(&context.fee_payer_address)?.clone();

            let signature = self.submit(&transaction, mode).await?;
            self.context
                .record_usage(item.transaction.expected_fee.transaction_fee)
                .await?;
            info!(
                target: "relay::orchestrator",
                signature = %signature,
                index,
                total,
                mode = mode.label(),
                "交易已中继"
            );

            if mode == RelayMode::Relay && index + 1 < total {
                self.wait_for_confirmation(&signature).await?;
            }
            signatures.push(signature);
        }
        Ok(signatures)
    }

    /// 报销 fee payer：额外垫付 + 开户租金 + 非免费的网络费。
    fn payback_instructions(
        &self,
        context: &RelayContext,
        item: &RelayItem,
        paying_fee_token: &TokenAccount,
    ) -> RelayResult<Vec<Instruction>> {
        let owner = self.identity.pubkey;
        let fee_payer = context.fee_payer_address;
        let expected_fee = item.transaction.expected_fee;
        let additional = item.additional_payback_fee;

        let mut payback = additional.saturating_add(expected_fee.account_creation_fee);
        if !context
            .usage_status
            .is_free_transaction_fee_available(expected_fee.transaction_fee, false)
        {
            payback = payback.saturating_add(expected_fee.transaction_fee);
        }
        if payback == 0 {
            return Ok(Vec::new());
        }

        let relay_spare = context
            .relay_account_status
            .balance()
            .unwrap_or(0)
            .saturating_sub(context.minimum_relay_account_balance);
        if paying_fee_token.mint == WSOL_MINT && relay_spare < payback {
            return Ok(vec![system_instruction::transfer(&owner, &fee_payer, payback)]);
        }

        let mut instructions = Vec::with_capacity(2);
        let from_relay = payback - additional;
        if from_relay > 0 {
            instructions.push(
                self.relay_program
                    .transfer_sol(&owner, &fee_payer, from_relay)?,
            );
        }
        if additional > 0 {
            instructions.push(system_instruction::transfer(&owner, &fee_payer, additional));
        }
        Ok(instructions)
    }

    async fn submit(&self, transaction: &Transaction, mode: RelayMode) -> RelayResult<String> {
        let network = &self.options.network_retry;
        let result = self
            .options
            .pending_account_retry
            .run("relay.submit", move || {
                network.run("relay.submit", move || async move {
                    match mode {
                        RelayMode::Relay => self.backend.relay_transaction(transaction).await,
                        RelayMode::SignatureOnly => {
                            self.backend.sign_relay_transaction(transaction).await
                        }
                    }
                })
            })
            .await;
        record_relay(mode.label(), if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn wait_for_confirmation(&self, signature: &str) -> RelayResult<()> {
        let parsed = Signature::from_str(signature).map_err(|err| {
            RelayError::Api(RelayApiError::Schema(format!(
                "后端返回的签名 `{signature}` 无法解析: {err}"
            )))
        })?;
        self.chain.wait_for_confirmation(&parsed).await
    }
}

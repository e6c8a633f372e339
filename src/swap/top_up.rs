use std::sync::Arc;

use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_system_interface::instruction as system_instruction;
use tracing::{debug, info};

use crate::api::{TopUpSignatures, TopUpWithSwapRequest};
use crate::context::{RelayAccountStatus, RelayContext};
use crate::error::{RelayError, RelayResult};
use crate::fee::{FeeAmount, calculate_expected_fee_for_top_up};
use crate::instructions::relay::TopUpAccounts;
use crate::instructions::{RelayProgram, WSOL_MINT};
use crate::router::{PoolRouter, PoolsPair, input_amount_for_minimum_output};
use crate::rpc::ChainClient;
use crate::transaction::{PreparedTransaction, TokenAccount};
use crate::transit::TransitTokenResolver;

use super::SwapData;

/// 充值计划；只对计算它时的 `RelayContext` 有效。
#[derive(Debug, Clone, PartialEq)]
pub struct TopUpPreparedParams {
    /// 兑换需保证的最少 lamports 输出，含 `expected_fee`。
    pub amount: u64,
    /// 充值交易自身的成本，由中继账户转回 fee payer。
    pub expected_fee: u64,
    pub pools_pair: PoolsPair,
}

/// 已签名的充值交易及提交所需的兑换数据。
#[derive(Debug, Clone)]
pub struct TopUpTransaction {
    pub prepared: PreparedTransaction,
    pub swap_data: SwapData,
    pub source_token: TokenAccount,
    pub fee_amount: u64,
}

impl TopUpTransaction {
    /// 转换为后端的 `relay_top_up_with_swap` 请求；要求交易已签名。
    pub fn request(&self, user: &Pubkey) -> RelayResult<TopUpWithSwapRequest> {
        let user_signature = self
            .prepared
            .signature_of(user)
            .ok_or(RelayError::InvalidSignature(*user))?;
        let transfer_authority = match &self.swap_data {
            SwapData::Direct(data) => data.transfer_authority,
            SwapData::Transitive(data) => data.from.transfer_authority,
        };
        let transfer_signature = self
            .prepared
            .signature_of(&transfer_authority)
            .ok_or(RelayError::InvalidSignature(transfer_authority))?;
        Ok(TopUpWithSwapRequest {
            user_source_token_account_pubkey: self.source_token.address,
            source_token_mint_pubkey: self.source_token.mint,
            user_authority_pubkey: *user,
            top_up_swap: (&self.swap_data).into(),
            fee_amount: self.fee_amount,
            signatures: TopUpSignatures {
                user_authority_signature: user_signature.to_string(),
                transfer_authority_signature: transfer_signature.to_string(),
            },
            blockhash: self.prepared.blockhash().to_string(),
        })
    }
}

pub struct TopUpTransactionBuilder {
    relay_program: RelayProgram,
    chain: Arc<dyn ChainClient>,
    router: Arc<dyn PoolRouter>,
}

impl TopUpTransactionBuilder {
    pub fn new(
        relay_program: RelayProgram,
        chain: Arc<dyn ChainClient>,
        router: Arc<dyn PoolRouter>,
    ) -> Self {
        Self {
            relay_program,
            chain,
            router,
        }
    }

    /// 选择把支付代币兑换为 SOL 的路径：优先单跳，否则按目标输出挑选最优两跳。
    pub async fn prepare(
        &self,
        context: &RelayContext,
        paying_mint: &Pubkey,
        needed: FeeAmount,
    ) -> RelayResult<TopUpPreparedParams> {
        if needed.is_zero() {
            return Err(RelayError::InvalidAmount);
        }
        // 同一笔交易会把 expected_fee 从中继账户转回 fee payer，输出必须额外覆盖它
        let expected_fee = calculate_expected_fee_for_top_up(context);
        let amount = needed.total().saturating_add(expected_fee);
        let not_found = || RelayError::SwapPoolsNotFound {
            from: *paying_mint,
            to: WSOL_MINT,
        };

        let routes = self.router.routes(paying_mint, &WSOL_MINT).await?;
        let direct: Vec<PoolsPair> = routes.iter().filter(|pair| pair.is_direct()).cloned().collect();
        let pools_pair = if direct.is_empty() {
            self.router
                .best_pools_pair_for_estimated_output(amount, &routes)
                .ok_or_else(not_found)?
        } else {
            self.router
                .best_pools_pair_for_estimated_output(amount, &direct)
                .or_else(|| direct.first().cloned())
                .ok_or_else(not_found)?
        };

        let params = TopUpPreparedParams {
            amount,
            expected_fee,
            pools_pair,
        };
        debug!(
            target: "relay::top_up",
            paying_mint = %paying_mint,
            amount = params.amount,
            expected_fee = params.expected_fee,
            hops = params.pools_pair.len(),
            "已选择充值路径"
        );
        Ok(params)
    }

    pub async fn build(
        &self,
        context: &RelayContext,
        user: &Arc<Keypair>,
        source_token: TokenAccount,
        params: &TopUpPreparedParams,
        slippage: f64,
        blockhash: Hash,
    ) -> RelayResult<TopUpTransaction> {
        if params.pools_pair.source_mint() != source_token.mint
            || params.pools_pair.destination_mint() != WSOL_MINT
        {
            return Err(RelayError::SwapPoolsNotFound {
                from: source_token.mint,
                to: WSOL_MINT,
            });
        }

        let owner = user.pubkey();
        let fee_payer = context.fee_payer_address;

        let transit = TransitTokenResolver::new(owner, self.relay_program, self.chain.clone());
        let transit_token = transit.get_transit_token(&params.pools_pair)?;
        let needs_create_transit = transit
            .check_if_needs_create_transit_token_account(transit_token.as_ref())
            .await?
            .unwrap_or(false);

        let amount_in = input_amount_for_minimum_output(
            self.router.as_ref(),
            &params.pools_pair,
            params.amount,
            slippage,
        )?;
        let swap_data = SwapData::quote(
            self.router.as_ref(),
            &params.pools_pair,
            amount_in,
            slippage,
            owner,
            needs_create_transit,
        )?;

        let mut instructions = Vec::with_capacity(4);
        if context.relay_account_status == RelayAccountStatus::NotYetCreated {
            instructions.push(system_instruction::transfer(
                &fee_payer,
                &self.relay_program.relay_address(&owner),
                context.minimum_relay_account_balance,
            ));
        }
        if needs_create_transit {
            if let Some(transit_token) = &transit_token {
                instructions.push(self.relay_program.create_transit_token_account(
                    &fee_payer,
                    &owner,
                    &transit_token.mint,
                ));
            }
        }
        instructions.push(self.relay_program.top_up_swap(
            &TopUpAccounts {
                fee_payer,
                user_authority: owner,
                user_source_token_account: source_token.address,
            },
            &swap_data,
        )?);
        instructions.push(
            self.relay_program
                .transfer_sol(&owner, &fee_payer, params.expected_fee)?,
        );

        let signers = vec![user.clone()];
        let network_fee = context
            .lamports_per_signature
            .saturating_mul(1 + signers.len() as u64);
        let mut prepared = PreparedTransaction::new(
            instructions,
            signers,
            FeeAmount::new(network_fee, 0),
            fee_payer,
            blockhash,
        );
        prepared.sign(&fee_payer)?;

        info!(
            target: "relay::top_up",
            owner = %owner,
            amount_in = swap_data.amount_in(),
            minimum_amount_out = swap_data.minimum_amount_out(),
            expected_fee = params.expected_fee,
            create_relay_account = context.relay_account_status == RelayAccountStatus::NotYetCreated,
            create_transit = needs_create_transit,
            "充值交易已构建"
        );

        Ok(TopUpTransaction {
            prepared,
            swap_data,
            source_token,
            fee_amount: params.expected_fee,
        })
    }
}

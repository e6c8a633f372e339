use std::sync::Arc;

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use tracing::debug;

use crate::context::RelayContext;
use crate::error::{RelayError, RelayResult};
use crate::fee::FeeAmount;
use crate::instructions::{RelayProgram, WSOL_MINT, ata, token_swap, wsol};
use crate::router::{PoolRouter, PoolsPair};
use crate::rpc::ChainClient;
use crate::transaction::{PreparedTransaction, TokenAccount};
use crate::transit::TransitTokenResolver;

use super::SwapData;

/// 兑换指令的 transfer authority。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferAuthority {
    /// 用户直接签名兑换指令。
    #[default]
    Owner,
    /// 每笔交易生成临时 authority，用户先 approve 输入数量。
    Delegate,
}

#[derive(Clone)]
pub struct SwapTransactionRequest {
    pub user: Arc<Keypair>,
    pub pools: PoolsPair,
    pub input_amount: u64,
    pub slippage: f64,
    pub source_token_account: TokenAccount,
    pub destination_token_mint: Pubkey,
    /// 调用方已知的目标账户；缺省时使用用户的 ATA。
    pub destination_token_address: Option<Pubkey>,
    pub blockhash: Hash,
}

#[derive(Debug, Clone)]
pub struct SwapTransactionOutput {
    /// 可选的前置建户交易在前，主交易在后。
    pub transactions: Vec<PreparedTransaction>,
    /// fee payer 垫付、需在中继时额外报销的租金。
    pub additional_payback_fee: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Existing(Pubkey),
    NeedsCreation(Pubkey),
    Native,
}

pub struct SwapTransactionBuilder {
    relay_program: RelayProgram,
    chain: Arc<dyn ChainClient>,
    router: Arc<dyn PoolRouter>,
    transfer_authority: TransferAuthority,
}

impl SwapTransactionBuilder {
    pub fn new(
        relay_program: RelayProgram,
        chain: Arc<dyn ChainClient>,
        router: Arc<dyn PoolRouter>,
    ) -> Self {
        Self {
            relay_program,
            chain,
            router,
            transfer_authority: TransferAuthority::default(),
        }
    }

    pub fn with_transfer_authority(mut self, transfer_authority: TransferAuthority) -> Self {
        self.transfer_authority = transfer_authority;
        self
    }

    pub async fn build(
        &self,
        context: &RelayContext,
        request: SwapTransactionRequest,
    ) -> RelayResult<SwapTransactionOutput> {
        validate(&request)?;

        let user = request.user.pubkey();
        let fee_payer = context.fee_payer_address;
        let rent = context.minimum_token_account_balance;

        // 链上查询与报价全部完成后才开始拼装指令
        let destination = self.resolve_destination(&request).await?;
        let transit = TransitTokenResolver::new(user, self.relay_program, self.chain.clone());
        let transit_token = transit.get_transit_token(&request.pools)?;
        let needs_create_transit = transit
            .check_if_needs_create_transit_token_account(transit_token.as_ref())
            .await?
            .unwrap_or(false);

        let delegate = match self.transfer_authority {
            TransferAuthority::Owner => None,
            TransferAuthority::Delegate => Some(Arc::new(Keypair::new())),
        };
        let authority = delegate
            .as_ref()
            .map(|keypair| keypair.pubkey())
            .unwrap_or(user);
        let swap_data = SwapData::quote(
            self.router.as_ref(),
            &request.pools,
            request.input_amount,
            request.slippage,
            authority,
            needs_create_transit,
        )?;

        let mut instructions: Vec<Instruction> = Vec::new();
        let mut additional_instructions: Vec<Instruction> = Vec::new();
        let mut closes: Vec<Instruction> = Vec::new();
        let mut signers = vec![request.user.clone()];
        let mut account_creation_fee = 0u64;
        let mut additional_payback_fee = 0u64;

        // 源账户为 WSOL 时用临时账户承接本金
        let source_is_ephemeral = request.source_token_account.mint == WSOL_MINT;
        let source = if source_is_ephemeral {
            let account = Arc::new(Keypair::new());
            instructions.push(wsol::fund_fee_payer(&user, &fee_payer, request.input_amount));
            instructions.extend(wsol::open_ephemeral_account(
                &fee_payer,
                &account.pubkey(),
                &user,
                request.input_amount.saturating_add(rent),
            )?);
            closes.push(wsol::close_ephemeral_account(&account.pubkey(), &user)?);
            signers.push(account.clone());
            additional_payback_fee += rent;
            account.pubkey()
        } else {
            request.source_token_account.address
        };

        let mut destination_closed = false;
        let destination_address = match destination {
            Destination::Existing(address) => address,
            Destination::Native => {
                let account = Arc::new(Keypair::new());
                instructions.extend(wsol::open_ephemeral_account(
                    &fee_payer,
                    &account.pubkey(),
                    &user,
                    rent,
                )?);
                closes.push(wsol::close_ephemeral_account(&account.pubkey(), &user)?);
                signers.push(account.clone());
                account_creation_fee += rent;
                destination_closed = true;
                account.pubkey()
            }
            Destination::NeedsCreation(address) => {
                let create =
                    ata::create_idempotent(&fee_payer, &user, &request.destination_token_mint);
                if source_is_ephemeral {
                    additional_instructions.push(create);
                } else {
                    instructions.push(create);
                    account_creation_fee += rent;
                }
                address
            }
        };

        if needs_create_transit {
            if let Some(transit_token) = &transit_token {
                instructions.push(self.relay_program.create_transit_token_account(
                    &fee_payer,
                    &user,
                    &transit_token.mint,
                ));
            }
        }

        if let Some(delegate) = &delegate {
            instructions.push(token_swap::approve(
                &source,
                &delegate.pubkey(),
                &user,
                request.input_amount,
            )?);
            signers.push(delegate.clone());
        }
        instructions.push(match &swap_data {
            SwapData::Direct(data) => token_swap::swap(data, &source, &destination_address),
            SwapData::Transitive(data) => self.relay_program.transitive_swap(
                &user,
                &source,
                &destination_address,
                data,
            )?,
        });

        // 临时账户在创建它的同一笔交易内关闭
        instructions.extend(closes);
        if destination_closed {
            account_creation_fee = account_creation_fee.saturating_sub(rent);
        }

        let mut transactions = Vec::with_capacity(2);
        if !additional_instructions.is_empty() {
            let signers = vec![request.user.clone()];
            let fee = FeeAmount::new(expected_network_fee(context, signers.len()), rent);
            let mut prepared = PreparedTransaction::new(
                additional_instructions,
                signers,
                fee,
                fee_payer,
                request.blockhash,
            );
            prepared.sign(&fee_payer)?;
            transactions.push(prepared);
        }

        let fee = FeeAmount::new(
            expected_network_fee(context, signers.len()),
            account_creation_fee,
        );
        let mut main = PreparedTransaction::new(
            instructions,
            signers,
            fee,
            fee_payer,
            request.blockhash,
        );
        main.sign(&fee_payer)?;
        transactions.push(main);

        debug!(
            target: "relay::swap",
            owner = %user,
            hops = request.pools.len(),
            transactions = transactions.len(),
            input_amount = request.input_amount,
            minimum_amount_out = swap_data.minimum_amount_out(),
            additional_payback_fee,
            "兑换交易已构建"
        );

        Ok(SwapTransactionOutput {
            transactions,
            additional_payback_fee,
        })
    }

    async fn resolve_destination(&self, request: &SwapTransactionRequest) -> RelayResult<Destination> {
        if request.destination_token_mint == WSOL_MINT {
            return Ok(Destination::Native);
        }
        if let Some(address) = request.destination_token_address {
            return Ok(Destination::Existing(address));
        }
        let address =
            ata::associated_token_address(&request.user.pubkey(), &request.destination_token_mint);
        Ok(match self.chain.account_info(&address).await? {
            Some(_) => Destination::Existing(address),
            None => Destination::NeedsCreation(address),
        })
    }
}

/// fee payer 与全部本地签名者的签名费。
fn expected_network_fee(context: &RelayContext, local_signers: usize) -> u64 {
    context
        .lamports_per_signature
        .saturating_mul(1 + local_signers as u64)
}

fn validate(request: &SwapTransactionRequest) -> RelayResult<()> {
    if request.input_amount == 0 || !(0.0..1.0).contains(&request.slippage) {
        return Err(RelayError::InvalidAmount);
    }
    if request.pools.source_mint() != request.source_token_account.mint
        || request.pools.destination_mint() != request.destination_token_mint
    {
        return Err(RelayError::SwapPoolsNotFound {
            from: request.source_token_account.mint,
            to: request.destination_token_mint,
        });
    }
    Ok(())
}

//! 两跳兑换的中转代币账户：由中继程序按 `[owner, mint, "transit"]` 推导。

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use tracing::debug;

use crate::error::{RelayError, RelayResult};
use crate::instructions::RelayProgram;
use crate::router::{Hops, PoolsPair};
use crate::rpc::ChainClient;
use crate::transaction::TokenAccount;

pub struct TransitTokenResolver {
    owner: Pubkey,
    relay_program: RelayProgram,
    chain: Arc<dyn ChainClient>,
}

impl TransitTokenResolver {
    pub fn new(owner: Pubkey, relay_program: RelayProgram, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            owner,
            relay_program,
            chain,
        }
    }

    /// 直接兑换返回 `None`；两跳时中转 mint 取第 1 跳的输出代币。
    pub fn get_transit_token(&self, pools: &PoolsPair) -> RelayResult<Option<TokenAccount>> {
        let Hops::Transitive(first, second) = pools.hops() else {
            return Ok(None);
        };
        let mint = first.destination_mint;
        if mint != second.source_mint || mint == Pubkey::default() {
            return Err(RelayError::TransitTokenMintNotFound);
        }
        Ok(Some(TokenAccount {
            address: self.relay_program.transit_token_address(&self.owner, &mint),
            mint,
        }))
    }

    /// 账户不存在或 mint 不一致时需要创建。
    pub async fn check_if_needs_create_transit_token_account(
        &self,
        transit_token: Option<&TokenAccount>,
    ) -> RelayResult<Option<bool>> {
        let Some(transit_token) = transit_token else {
            return Ok(None);
        };
        let account = self.chain.account_info(&transit_token.address).await?;
        let needs_create = match account {
            None => true,
            Some(account) => match spl_token::state::Account::unpack(&account.data) {
                Ok(state) => state.mint != transit_token.mint,
                Err(_) => true,
            },
        };
        debug!(
            target: "relay::transit",
            address = %transit_token.address,
            mint = %transit_token.mint,
            needs_create,
            "已检查中转代币账户"
        );
        Ok(Some(needs_create))
    }
}

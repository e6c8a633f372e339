use solana_sdk::pubkey::Pubkey;

use crate::error::{RelayError, RelayResult};
use crate::router::{HopAmounts, Hops, PoolRouter, PoolsPair, SwapPool, quote_hop};

/// 单池兑换所需的账户与数量。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectSwapData {
    pub program_id: Pubkey,
    pub account: Pubkey,
    pub authority: Pubkey,
    pub transfer_authority: Pubkey,
    pub source: Pubkey,
    pub destination: Pubkey,
    pub pool_token_mint: Pubkey,
    pub pool_fee_account: Pubkey,
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

impl DirectSwapData {
    pub fn new(pool: &SwapPool, transfer_authority: Pubkey, amounts: HopAmounts) -> Self {
        Self {
            program_id: pool.program_id,
            account: pool.address,
            authority: pool.authority,
            transfer_authority,
            source: pool.pool_source,
            destination: pool.pool_destination,
            pool_token_mint: pool.pool_token_mint,
            pool_fee_account: pool.fee_account,
            amount_in: amounts.amount_in,
            minimum_amount_out: amounts.minimum_amount_out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitiveSwapData {
    pub from: DirectSwapData,
    pub to: DirectSwapData,
    pub transit_token_mint: Pubkey,
    pub needs_create_transit_token_account: bool,
}

/// 兑换数据。新增变体时所有 match 站点都会在编译期报错。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapData {
    Direct(DirectSwapData),
    Transitive(TransitiveSwapData),
}

impl SwapData {
    /// 按路径正向报价并组装兑换数据：第 1 跳的最少输出即第 2 跳的输入。
    pub fn quote(
        router: &dyn PoolRouter,
        pair: &PoolsPair,
        amount_in: u64,
        slippage: f64,
        transfer_authority: Pubkey,
        needs_create_transit_token_account: bool,
    ) -> RelayResult<Self> {
        match pair.hops() {
            Hops::Direct(pool) => {
                let hop = quote_hop(router, pool, amount_in, slippage)?;
                Ok(Self::Direct(DirectSwapData::new(pool, transfer_authority, hop)))
            }
            Hops::Transitive(first, second) => {
                if first.destination_mint != second.source_mint {
                    return Err(RelayError::TransitTokenMintNotFound);
                }
                let from = quote_hop(router, first, amount_in, slippage)?;
                let to = quote_hop(router, second, from.minimum_amount_out, slippage)?;
                Ok(Self::Transitive(TransitiveSwapData {
                    from: DirectSwapData::new(first, transfer_authority, from),
                    to: DirectSwapData::new(second, transfer_authority, to),
                    transit_token_mint: first.destination_mint,
                    needs_create_transit_token_account,
                }))
            }
        }
    }

    pub fn amount_in(&self) -> u64 {
        match self {
            Self::Direct(data) => data.amount_in,
            Self::Transitive(data) => data.from.amount_in,
        }
    }

    pub fn minimum_amount_out(&self) -> u64 {
        match self {
            Self::Direct(data) => data.minimum_amount_out,
            Self::Transitive(data) => data.to.minimum_amount_out,
        }
    }
}

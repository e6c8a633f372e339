//! AMM 路由抽象：池子数据与报价接口。曲线数学由外部实现提供。

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::error::{RelayError, RelayResult};

/// 已按兑换方向定向的单个 token-swap 池子。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPool {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub authority: Pubkey,
    pub source_mint: Pubkey,
    pub destination_mint: Pubkey,
    /// 池子持有输入代币的金库账户。
    pub pool_source: Pubkey,
    /// 池子持有输出代币的金库账户。
    pub pool_destination: Pubkey,
    pub pool_token_mint: Pubkey,
    pub fee_account: Pubkey,
}

/// 1 跳（直接）或 2 跳（中转）的兑换路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolsPair(Vec<SwapPool>);

/// `PoolsPair` 的结构化视图。
#[derive(Debug, Clone, Copy)]
pub enum Hops<'a> {
    Direct(&'a SwapPool),
    Transitive(&'a SwapPool, &'a SwapPool),
}

impl PoolsPair {
    pub fn new(pools: Vec<SwapPool>) -> RelayResult<Self> {
        match pools.len() {
            1 | 2 => Ok(Self(pools)),
            other => Err(RelayError::InvalidPoolCount(other)),
        }
    }

    pub fn direct(pool: SwapPool) -> Self {
        Self(vec![pool])
    }

    pub fn transitive(first: SwapPool, second: SwapPool) -> Self {
        Self(vec![first, second])
    }

    pub fn hops(&self) -> Hops<'_> {
        match self.0.as_slice() {
            [pool] => Hops::Direct(pool),
            [first, second] => Hops::Transitive(first, second),
            _ => unreachable!("PoolsPair 构造时已校验池子数量"),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_direct(&self) -> bool {
        self.0.len() == 1
    }

    pub fn pools(&self) -> &[SwapPool] {
        &self.0
    }

    pub fn source_mint(&self) -> Pubkey {
        self.0[0].source_mint
    }

    pub fn destination_mint(&self) -> Pubkey {
        self.0[self.0.len() - 1].destination_mint
    }
}

/// 外部路由/报价服务。
#[async_trait]
pub trait PoolRouter: Send + Sync {
    async fn routes(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
    ) -> RelayResult<Vec<PoolsPair>>;

    /// 在候选路径中选择对给定目标输出量最优的一条。
    fn best_pools_pair_for_estimated_output(
        &self,
        estimated_amount_out: u64,
        pairs: &[PoolsPair],
    ) -> Option<PoolsPair>;

    fn amount_out(&self, pool: &SwapPool, amount_in: u64) -> Option<u64>;

    /// 获得 `amount_out` 所需的最少输入。
    fn amount_in(&self, pool: &SwapPool, amount_out: u64) -> Option<u64>;

    fn minimum_amount_out(&self, pool: &SwapPool, amount_in: u64, slippage: f64) -> Option<u64>;
}

/// 单跳的输入与最少输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopAmounts {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

/// 单跳报价：最少输出为 0 或报价失败时视为无效数量。
pub fn quote_hop(
    router: &dyn PoolRouter,
    pool: &SwapPool,
    amount_in: u64,
    slippage: f64,
) -> RelayResult<HopAmounts> {
    if amount_in == 0 {
        return Err(RelayError::InvalidAmount);
    }
    let minimum_amount_out = router
        .minimum_amount_out(pool, amount_in, slippage)
        .filter(|amount| *amount > 0)
        .ok_or(RelayError::InvalidAmount)?;
    Ok(HopAmounts {
        amount_in,
        minimum_amount_out,
    })
}

/// 反向估算：为保证最终最少输出不低于 `minimum_amount_out` 所需的输入量。
pub fn input_amount_for_minimum_output(
    router: &dyn PoolRouter,
    pair: &PoolsPair,
    minimum_amount_out: u64,
    slippage: f64,
) -> RelayResult<u64> {
    if minimum_amount_out == 0 {
        return Err(RelayError::InvalidAmount);
    }
    let mut required = minimum_amount_out;
    for pool in pair.pools().iter().rev() {
        let expected_out = inflate_for_slippage(required, slippage)?;
        required = router
            .amount_in(pool, expected_out)
            .filter(|amount| *amount > 0)
            .ok_or(RelayError::InvalidAmount)?;
    }
    Ok(required)
}

fn inflate_for_slippage(amount: u64, slippage: f64) -> RelayResult<u64> {
    if !(0.0..1.0).contains(&slippage) {
        return Err(RelayError::InvalidAmount);
    }
    let inflated = (amount as f64 / (1.0 - slippage)).ceil();
    if !inflated.is_finite() || inflated > u64::MAX as f64 {
        return Err(RelayError::InvalidAmount);
    }
    Ok(inflated as u64)
}

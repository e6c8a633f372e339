//! 充值金额计算。网络费与开户租金分开累计，只有前者可能被免费额度抵扣。

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use solana_sdk::pubkey::Pubkey;

use crate::context::{RelayAccountStatus, RelayContext};
use crate::instructions::WSOL_MINT;

/// 低于该值的兑换不经济，充值总额会被抬到这里。
pub const MINIMUM_TOP_UP_LAMPORTS: u64 = 1_000;

/// 充值交易需要 fee payer 与用户两个签名。
const TOP_UP_SIGNATURES: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeAmount {
    pub transaction_fee: u64,
    pub account_creation_fee: u64,
}

impl FeeAmount {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(transaction_fee: u64, account_creation_fee: u64) -> Self {
        Self {
            transaction_fee,
            account_creation_fee,
        }
    }

    pub fn total(&self) -> u64 {
        self.transaction_fee.saturating_add(self.account_creation_fee)
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl Add for FeeAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            transaction_fee: self.transaction_fee.saturating_add(rhs.transaction_fee),
            account_creation_fee: self
                .account_creation_fee
                .saturating_add(rhs.account_creation_fee),
        }
    }
}

impl AddAssign for FeeAmount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for FeeAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// 为支付 `expected_fee` 需要从用户代币兑换出的 lamports。
pub fn calculate_needed_top_up_amount(
    context: &RelayContext,
    expected_fee: FeeAmount,
    paying_token_mint: &Pubkey,
) -> FeeAmount {
    let usage = &context.usage_status;

    let mut top_up_network_fee = context
        .lamports_per_signature
        .saturating_mul(TOP_UP_SIGNATURES);
    let mut transaction_network_fee = expected_fee.transaction_fee;
    if usage.is_free_transaction_fee_available(top_up_network_fee, false) {
        top_up_network_fee = 0;
    }
    if usage.is_free_transaction_fee_available(
        top_up_network_fee.saturating_add(transaction_network_fee),
        true,
    ) {
        transaction_network_fee = 0;
    }

    let before_offset = FeeAmount::new(
        top_up_network_fee.saturating_add(transaction_network_fee),
        expected_fee.account_creation_fee,
    );
    if before_offset.is_zero() {
        return before_offset;
    }

    let mut needed = offset_by_relay_account(context, before_offset);

    // 直接用 SOL 支付时不使用中继账户余额抵扣
    if needed.total() > 0 && *paying_token_mint == WSOL_MINT {
        needed = before_offset;
    }

    apply_minimum_top_up(needed)
}

fn offset_by_relay_account(context: &RelayContext, mut needed: FeeAmount) -> FeeAmount {
    let minimum = context.minimum_relay_account_balance;
    match context.relay_account_status {
        RelayAccountStatus::NotYetCreated => {
            needed.transaction_fee = needed.transaction_fee.saturating_add(minimum);
        }
        RelayAccountStatus::Created { balance } if balance < minimum => {
            needed.transaction_fee = needed.transaction_fee.saturating_add(minimum - balance);
        }
        RelayAccountStatus::Created { balance } => {
            let spare = balance - minimum;
            if spare >= needed.transaction_fee {
                let remaining = spare - needed.transaction_fee;
                needed.transaction_fee = 0;
                needed.account_creation_fee = needed.account_creation_fee.saturating_sub(remaining);
            } else {
                needed.transaction_fee -= spare;
            }
        }
    }
    needed
}

/// 非零且低于下限的充值抬到下限；对结果重复应用不改变数值。
pub fn apply_minimum_top_up(mut needed: FeeAmount) -> FeeAmount {
    let total = needed.total();
    if total > 0 && total < MINIMUM_TOP_UP_LAMPORTS {
        needed.transaction_fee += MINIMUM_TOP_UP_LAMPORTS - total;
    }
    needed
}

/// 充值交易自身的成本：中继账户租金（未创建时）、网络费（不免费时）与一个代币账户租金。
pub fn calculate_expected_fee_for_top_up(context: &RelayContext) -> u64 {
    let mut fee = 0u64;
    if context.relay_account_status == RelayAccountStatus::NotYetCreated {
        fee = fee.saturating_add(context.minimum_relay_account_balance);
    }
    let network_fee = context
        .lamports_per_signature
        .saturating_mul(TOP_UP_SIGNATURES);
    if !context
        .usage_status
        .is_free_transaction_fee_available(network_fee, false)
    {
        fee = fee.saturating_add(network_fee);
    }
    fee.saturating_add(context.minimum_token_account_balance)
}

#[cfg(test)]
mod tests;

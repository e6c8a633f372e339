//! 中继上下文：一次性拉取定价与构建交易所需的全部链上/后端状态。

mod manager;

use solana_sdk::pubkey::Pubkey;

pub use manager::RelayContextManager;

/// 中继账户在链上的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAccountStatus {
    NotYetCreated,
    Created { balance: u64 },
}

impl RelayAccountStatus {
    pub fn from_balance(balance: Option<u64>) -> Self {
        match balance {
            Some(balance) => Self::Created { balance },
            None => Self::NotYetCreated,
        }
    }

    pub fn balance(&self) -> Option<u64> {
        match self {
            Self::NotYetCreated => None,
            Self::Created { balance } => Some(*balance),
        }
    }
}

/// 免费交易额度计数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageStatus {
    pub max_usage: u64,
    pub current_usage: u64,
    pub max_amount: u64,
    pub amount_used: u64,
}

impl UsageStatus {
    /// 判断 `transaction_fee` 能否由免费额度覆盖；`for_next_transaction` 表示按下一笔占用的名额计算。
    pub fn is_free_transaction_fee_available(
        &self,
        transaction_fee: u64,
        for_next_transaction: bool,
    ) -> bool {
        let mut current_usage = self.current_usage;
        if for_next_transaction {
            current_usage = current_usage.saturating_add(1);
        }
        current_usage < self.max_usage
            && self.amount_used.saturating_add(transaction_fee) <= self.max_amount
    }

    pub(crate) fn record(&mut self, fee: u64) {
        self.current_usage = self.current_usage.saturating_add(1);
        self.amount_used = self.amount_used.saturating_add(fee);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayContext {
    pub minimum_token_account_balance: u64,
    pub minimum_relay_account_balance: u64,
    pub fee_payer_address: Pubkey,
    pub lamports_per_signature: u64,
    pub relay_account_status: RelayAccountStatus,
    pub usage_status: UsageStatus,
}

impl RelayContext {
    /// 比较非易变字段；免费额度计数允许在本地漂移。
    pub fn same_state(&self, other: &RelayContext) -> bool {
        self.minimum_token_account_balance == other.minimum_token_account_balance
            && self.minimum_relay_account_balance == other.minimum_relay_account_balance
            && self.fee_payer_address == other.fee_payer_address
            && self.lamports_per_signature == other.lamports_per_signature
            && self.relay_account_status == other.relay_account_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(max_usage: u64, current_usage: u64, max_amount: u64, amount_used: u64) -> UsageStatus {
        UsageStatus {
            max_usage,
            current_usage,
            max_amount,
            amount_used,
        }
    }

    #[test]
    fn free_fee_respects_count_and_amount() {
        let status = usage(100, 0, 10_000_000, 0);
        assert!(status.is_free_transaction_fee_available(10_000, false));
        assert!(status.is_free_transaction_fee_available(10_000, true));

        let exhausted_amount = usage(100, 0, 10_000, 5_000);
        assert!(exhausted_amount.is_free_transaction_fee_available(5_000, false));
        assert!(!exhausted_amount.is_free_transaction_fee_available(5_001, false));

        let last_slot = usage(2, 1, 10_000_000, 0);
        assert!(last_slot.is_free_transaction_fee_available(5_000, false));
        assert!(!last_slot.is_free_transaction_fee_available(5_000, true));
    }

    #[test]
    fn same_state_ignores_usage_drift() {
        let base = RelayContext {
            minimum_token_account_balance: 2_039_280,
            minimum_relay_account_balance: 890_880,
            fee_payer_address: Pubkey::new_unique(),
            lamports_per_signature: 5_000,
            relay_account_status: RelayAccountStatus::Created { balance: 1_000_000 },
            usage_status: usage(100, 3, 10_000_000, 15_000),
        };
        let mut drifted = base.clone();
        drifted.usage_status.record(5_000);
        assert!(base.same_state(&drifted));

        let mut funded = base.clone();
        funded.relay_account_status = RelayAccountStatus::Created { balance: 2_000_000 };
        assert!(!base.same_state(&funded));
    }
}

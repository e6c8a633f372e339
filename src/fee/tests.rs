use super::*;
use crate::context::UsageStatus;

const LPS: u64 = 5_000;
const TOKEN_RENT: u64 = 2_039_280;
const RELAY_RENT: u64 = 890_880;

fn context(relay: RelayAccountStatus, usage: UsageStatus) -> RelayContext {
    RelayContext {
        minimum_token_account_balance: TOKEN_RENT,
        minimum_relay_account_balance: RELAY_RENT,
        fee_payer_address: Pubkey::new_unique(),
        lamports_per_signature: LPS,
        relay_account_status: relay,
        usage_status: usage,
    }
}

fn generous() -> UsageStatus {
    UsageStatus {
        max_usage: 100,
        current_usage: 0,
        max_amount: 10_000_000,
        amount_used: 0,
    }
}

fn exhausted() -> UsageStatus {
    UsageStatus {
        max_usage: 100,
        current_usage: 100,
        max_amount: 10_000_000,
        amount_used: 10_000_000,
    }
}

fn usdc() -> Pubkey {
    Pubkey::new_unique()
}

#[test]
fn fully_free_transaction_needs_nothing() {
    for relay in [
        RelayAccountStatus::NotYetCreated,
        RelayAccountStatus::Created { balance: 0 },
        RelayAccountStatus::Created { balance: 5_000_000 },
    ] {
        let ctx = context(relay, generous());
        for fee in [0, 5_000, 10_000, 15_000] {
            let needed = calculate_needed_top_up_amount(&ctx, FeeAmount::new(fee, 0), &usdc());
            assert_eq!(needed, FeeAmount::ZERO, "fee {fee} relay {relay:?}");
        }
    }
}

#[test]
fn rich_relay_account_covers_everything() {
    let fees = [
        FeeAmount::new(10_000, 0),
        FeeAmount::new(15_000, TOKEN_RENT),
        FeeAmount::new(0, TOKEN_RENT),
    ];
    for fee in fees {
        let pre_offset = FeeAmount::new(2 * LPS + fee.transaction_fee, fee.account_creation_fee);
        for extra in [0, 1, 1_000_000] {
            let balance = RELAY_RENT + pre_offset.total() + extra;
            let ctx = context(RelayAccountStatus::Created { balance }, exhausted());
            let needed = calculate_needed_top_up_amount(&ctx, fee, &usdc());
            assert_eq!(needed.total(), 0, "fee {fee:?} balance {balance}");
        }
    }
}

#[test]
fn uncreated_relay_account_adds_its_rent() {
    let ctx = context(RelayAccountStatus::NotYetCreated, exhausted());
    let needed = calculate_needed_top_up_amount(&ctx, FeeAmount::new(10_000, TOKEN_RENT), &usdc());
    assert_eq!(needed, FeeAmount::new(2 * LPS + 10_000 + RELAY_RENT, TOKEN_RENT));
}

#[test]
fn underfunded_relay_account_adds_shortfall() {
    let ctx = context(RelayAccountStatus::Created { balance: RELAY_RENT - 100 }, exhausted());
    let needed = calculate_needed_top_up_amount(&ctx, FeeAmount::new(5_000, 0), &usdc());
    assert_eq!(needed, FeeAmount::new(2 * LPS + 5_000 + 100, 0));
}

#[test]
fn partial_spare_reduces_transaction_fee() {
    let ctx = context(RelayAccountStatus::Created { balance: RELAY_RENT + 4_000 }, exhausted());
    let needed = calculate_needed_top_up_amount(&ctx, FeeAmount::new(5_000, TOKEN_RENT), &usdc());
    assert_eq!(needed, FeeAmount::new(2 * LPS + 5_000 - 4_000, TOKEN_RENT));
}

#[test]
fn spare_after_transaction_fee_reduces_account_creation() {
    let spare = 2 * LPS + 5_000 + 1_000_000;
    let ctx = context(RelayAccountStatus::Created { balance: RELAY_RENT + spare }, exhausted());
    let needed = calculate_needed_top_up_amount(&ctx, FeeAmount::new(5_000, TOKEN_RENT), &usdc());
    assert_eq!(needed, FeeAmount::new(0, TOKEN_RENT - 1_000_000));
}

#[test]
fn native_payer_ignores_relay_offset() {
    let ctx = context(RelayAccountStatus::NotYetCreated, exhausted());
    let needed =
        calculate_needed_top_up_amount(&ctx, FeeAmount::new(10_000, TOKEN_RENT), &WSOL_MINT);
    assert_eq!(needed, FeeAmount::new(2 * LPS + 10_000, TOKEN_RENT));
}

#[test]
fn top_up_fee_free_but_transaction_fee_not() {
    // 还剩 1 个免费名额：充值交易可免费，下一笔不可
    let usage = UsageStatus {
        max_usage: 2,
        current_usage: 1,
        max_amount: 10_000_000,
        amount_used: 0,
    };
    let spare = 1_000_000;
    let ctx = context(RelayAccountStatus::Created { balance: RELAY_RENT + spare }, usage);
    let needed = calculate_needed_top_up_amount(&ctx, FeeAmount::new(5_000, 0), &usdc());
    assert_eq!(needed, FeeAmount::ZERO);

    let ctx = context(RelayAccountStatus::Created { balance: RELAY_RENT + 4_500 }, usage);
    let needed = calculate_needed_top_up_amount(&ctx, FeeAmount::new(5_000, 0), &usdc());
    assert_eq!(needed, FeeAmount::new(MINIMUM_TOP_UP_LAMPORTS, 0));
}

#[test]
fn dust_floor_is_exact_and_idempotent() {
    for total in [1u64, 2, 499, 500, 999] {
        let raised = apply_minimum_top_up(FeeAmount::new(total, 0));
        assert_eq!(raised.total(), MINIMUM_TOP_UP_LAMPORTS);
        assert_eq!(apply_minimum_top_up(raised), raised);

        let split = apply_minimum_top_up(FeeAmount::new(0, total));
        assert_eq!(split.total(), MINIMUM_TOP_UP_LAMPORTS);
        assert_eq!(split.account_creation_fee, total);
    }
    assert_eq!(apply_minimum_top_up(FeeAmount::ZERO), FeeAmount::ZERO);
    let large = FeeAmount::new(1_000, 5);
    assert_eq!(apply_minimum_top_up(large), large);
}

#[test]
fn expected_top_up_fee_components() {
    let ctx = context(RelayAccountStatus::NotYetCreated, exhausted());
    assert_eq!(
        calculate_expected_fee_for_top_up(&ctx),
        RELAY_RENT + 2 * LPS + TOKEN_RENT
    );

    let ctx = context(RelayAccountStatus::Created { balance: 0 }, generous());
    assert_eq!(calculate_expected_fee_for_top_up(&ctx), TOKEN_RENT);
}

#[test]
fn fee_amounts_sum_per_component() {
    let total: FeeAmount = [FeeAmount::new(10_000, TOKEN_RENT), FeeAmount::new(15_000, 0)]
        .into_iter()
        .sum();
    assert_eq!(total, FeeAmount::new(25_000, TOKEN_RENT));
}

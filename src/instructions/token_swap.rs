//! SPL token-swap 程序的单池兑换与 token approve。

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::error::{RelayError, RelayResult};
use crate::swap::DirectSwapData;

use super::TOKEN_PROGRAM_ID;

pub const TOKEN_SWAP_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("SwaPpA9LAaLfeLi3a68M4DjnLqgtticKg6CnyNwgAC8");

const SWAP_TAG: u8 = 1;

/// 单池兑换：从 `user_source` 换入 `user_destination`，由 `swap.transfer_authority` 签名。
pub fn swap(swap: &DirectSwapData, user_source: &Pubkey, user_destination: &Pubkey) -> Instruction {
    let mut data = Vec::with_capacity(17);
    data.push(SWAP_TAG);
    data.extend_from_slice(&swap.amount_in.to_le_bytes());
    data.extend_from_slice(&swap.minimum_amount_out.to_le_bytes());
    Instruction {
        program_id: swap.program_id,
        accounts: vec![
            AccountMeta::new_readonly(swap.account, false),
            AccountMeta::new_readonly(swap.authority, false),
            AccountMeta::new_readonly(swap.transfer_authority, true),
            AccountMeta::new(*user_source, false),
            AccountMeta::new(swap.source, false),
            AccountMeta::new(swap.destination, false),
            AccountMeta::new(*user_destination, false),
            AccountMeta::new(swap.pool_token_mint, false),
            AccountMeta::new(swap.pool_fee_account, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data,
    }
}

/// 授权 `delegate` 从 `source` 转出至多 `amount`。
pub fn approve(
    source: &Pubkey,
    delegate: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> RelayResult<Instruction> {
    spl_token::instruction::approve(&TOKEN_PROGRAM_ID, source, delegate, owner, &[], amount)
        .map_err(|err| RelayError::instruction(format!("构建 approve 指令失败: {err}")))
}

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::cache::cached_associated_token_address;

use super::{ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// 幂等创建 ATA 的指令标签。
const CREATE_IDEMPOTENT: u8 = 1;

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    cached_associated_token_address(owner, mint, &TOKEN_PROGRAM_ID)
}

/// 由 `funder` 出租金为 `owner` 创建 `mint` 的 ATA；账户已存在时链上直接成功。
pub fn create_idempotent(funder: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    let ata = associated_token_address(owner, mint);
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![CREATE_IDEMPOTENT],
    }
}

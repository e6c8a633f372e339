//! 临时 WSOL 账户：由 fee payer 出资创建、初始化，并在同一笔交易末尾关闭。

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_system_interface::instruction as system_instruction;
use spl_token::solana_program::program_pack::Pack;

use crate::error::{RelayError, RelayResult};

use super::{TOKEN_PROGRAM_ID, WSOL_MINT};

/// 用户把兑换本金转给 fee payer，再由 fee payer 放入临时账户。
pub fn fund_fee_payer(owner: &Pubkey, fee_payer: &Pubkey, amount: u64) -> Instruction {
    system_instruction::transfer(owner, fee_payer, amount)
}

/// fee payer 出资创建 `account` 并初始化为 `owner` 持有的 WSOL 账户。
pub fn open_ephemeral_account(
    fee_payer: &Pubkey,
    account: &Pubkey,
    owner: &Pubkey,
    lamports: u64,
) -> RelayResult<[Instruction; 2]> {
    let create = system_instruction::create_account(
        fee_payer,
        account,
        lamports,
        spl_token::state::Account::LEN as u64,
        &TOKEN_PROGRAM_ID,
    );
    let initialize =
        spl_token::instruction::initialize_account(&TOKEN_PROGRAM_ID, account, &WSOL_MINT, owner)
            .map_err(|err| RelayError::instruction(format!("初始化临时 WSOL 账户失败: {err}")))?;
    Ok([create, initialize])
}

/// 关闭临时账户，余额与租金全部退回 `owner`。
pub fn close_ephemeral_account(account: &Pubkey, owner: &Pubkey) -> RelayResult<Instruction> {
    spl_token::instruction::close_account(&TOKEN_PROGRAM_ID, account, owner, owner, &[])
        .map_err(|err| RelayError::instruction(format!("关闭临时 WSOL 账户失败: {err}")))
}

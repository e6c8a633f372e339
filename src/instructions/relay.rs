//! 中继程序指令。数据布局为 1 字节标签 + borsh 编码的小端 `u64` 参数。

use borsh::BorshSerialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::cache::cached_program_address;
use crate::error::{RelayError, RelayResult};
use crate::swap::{DirectSwapData, SwapData, TransitiveSwapData};

use super::{RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, WSOL_MINT};

pub const MAINNET_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("12YKFL4mnZz6CBEGePrf293mEzueQM3h8VLPUJsKpGs9");
pub const DEVNET_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("6xKJFyuM6UHCT8F5SBxnjGt6ZrZYjsVfnAnAeHPU775k");

const RELAY_SEED: &[u8] = b"relay";
const TEMPORARY_WSOL_SEED: &[u8] = b"temporary_wsol";
const TRANSIT_SEED: &[u8] = b"transit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RelayInstructionTag {
    TopUpWithDirectSwap = 0,
    TopUpWithTransitiveSwap = 1,
    TransferSol = 2,
    CreateTransitToken = 3,
    TransitiveSwap = 4,
}

#[derive(BorshSerialize)]
struct DirectSwapArgs {
    amount_in: u64,
    minimum_amount_out: u64,
}

#[derive(BorshSerialize)]
struct TransitiveSwapArgs {
    amount_in: u64,
    transit_minimum_amount: u64,
    minimum_amount_out: u64,
}

#[derive(BorshSerialize)]
struct TransferSolArgs {
    amount: u64,
}

/// 充值兑换涉及的用户侧账户。
#[derive(Debug, Clone, Copy)]
pub struct TopUpAccounts {
    pub fee_payer: Pubkey,
    pub user_authority: Pubkey,
    pub user_source_token_account: Pubkey,
}

/// 绑定到某个集群部署地址的中继程序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayProgram {
    id: Pubkey,
}

impl RelayProgram {
    pub const fn new(id: Pubkey) -> Self {
        Self { id }
    }

    pub const fn mainnet() -> Self {
        Self::new(MAINNET_PROGRAM_ID)
    }

    pub const fn devnet() -> Self {
        Self::new(DEVNET_PROGRAM_ID)
    }

    pub fn id(&self) -> Pubkey {
        self.id
    }

    pub fn relay_address(&self, user: &Pubkey) -> Pubkey {
        cached_program_address(&[user.as_ref(), RELAY_SEED], &self.id)
    }

    pub fn temporary_wsol_address(&self, user: &Pubkey) -> Pubkey {
        cached_program_address(&[user.as_ref(), TEMPORARY_WSOL_SEED], &self.id)
    }

    pub fn transit_token_address(&self, user: &Pubkey, transit_mint: &Pubkey) -> Pubkey {
        cached_program_address(&[user.as_ref(), transit_mint.as_ref(), TRANSIT_SEED], &self.id)
    }

    /// 把用户代币兑换为 SOL 并解包到中继账户。
    pub fn top_up_swap(&self, accounts: &TopUpAccounts, swap: &SwapData) -> RelayResult<Instruction> {
        match swap {
            SwapData::Direct(data) => self.top_up_with_direct_swap(accounts, data),
            SwapData::Transitive(data) => self.top_up_with_transitive_swap(accounts, data),
        }
    }

    fn top_up_with_direct_swap(
        &self,
        accounts: &TopUpAccounts,
        swap: &DirectSwapData,
    ) -> RelayResult<Instruction> {
        let user = accounts.user_authority;
        let mut metas = vec![
            AccountMeta::new_readonly(WSOL_MINT, false),
            AccountMeta::new(accounts.fee_payer, true),
            AccountMeta::new_readonly(user, true),
            AccountMeta::new(self.relay_address(&user), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ];
        metas.extend(pool_metas(swap, true));
        metas.extend([
            AccountMeta::new_readonly(swap.transfer_authority, true),
            AccountMeta::new(accounts.user_source_token_account, false),
            AccountMeta::new(self.temporary_wsol_address(&user), false),
            AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ]);
        let data = encode(
            RelayInstructionTag::TopUpWithDirectSwap,
            &DirectSwapArgs {
                amount_in: swap.amount_in,
                minimum_amount_out: swap.minimum_amount_out,
            },
        )?;
        Ok(self.instruction(metas, data))
    }

    fn top_up_with_transitive_swap(
        &self,
        accounts: &TopUpAccounts,
        swap: &TransitiveSwapData,
    ) -> RelayResult<Instruction> {
        let user = accounts.user_authority;
        let mut metas = vec![
            AccountMeta::new_readonly(WSOL_MINT, false),
            AccountMeta::new(accounts.fee_payer, true),
            AccountMeta::new_readonly(user, true),
            AccountMeta::new(self.relay_address(&user), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(swap.from.transfer_authority, true),
            AccountMeta::new(accounts.user_source_token_account, false),
            AccountMeta::new(
                self.transit_token_address(&user, &swap.transit_token_mint),
                false,
            ),
            AccountMeta::new(self.temporary_wsol_address(&user), false),
        ];
        metas.extend(pool_metas(&swap.from, true));
        metas.extend(pool_metas(&swap.to, true));
        metas.extend([
            AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ]);
        let data = encode(
            RelayInstructionTag::TopUpWithTransitiveSwap,
            &TransitiveSwapArgs {
                amount_in: swap.from.amount_in,
                transit_minimum_amount: swap.from.minimum_amount_out,
                minimum_amount_out: swap.to.minimum_amount_out,
            },
        )?;
        Ok(self.instruction(metas, data))
    }

    /// 从用户的中继账户向 `recipient` 转出 `amount` lamports。
    pub fn transfer_sol(
        &self,
        user_authority: &Pubkey,
        recipient: &Pubkey,
        amount: u64,
    ) -> RelayResult<Instruction> {
        let metas = vec![
            AccountMeta::new_readonly(*user_authority, true),
            AccountMeta::new(self.relay_address(user_authority), false),
            AccountMeta::new(*recipient, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];
        let data = encode(RelayInstructionTag::TransferSol, &TransferSolArgs { amount })?;
        Ok(self.instruction(metas, data))
    }

    /// 由 fee payer 出租金创建两跳兑换的中转代币账户。
    pub fn create_transit_token_account(
        &self,
        fee_payer: &Pubkey,
        user_authority: &Pubkey,
        transit_mint: &Pubkey,
    ) -> Instruction {
        let metas = vec![
            AccountMeta::new(
                self.transit_token_address(user_authority, transit_mint),
                false,
            ),
            AccountMeta::new_readonly(*transit_mint, false),
            AccountMeta::new_readonly(*user_authority, true),
            AccountMeta::new(*fee_payer, true),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];
        self.instruction(metas, vec![RelayInstructionTag::CreateTransitToken as u8])
    }

    /// 经中转账户一次完成两跳兑换。
    pub fn transitive_swap(
        &self,
        user_authority: &Pubkey,
        user_source_token_account: &Pubkey,
        user_destination_token_account: &Pubkey,
        swap: &TransitiveSwapData,
    ) -> RelayResult<Instruction> {
        let mut metas = vec![
            AccountMeta::new(*user_source_token_account, false),
            AccountMeta::new(
                self.transit_token_address(user_authority, &swap.transit_token_mint),
                false,
            ),
            AccountMeta::new(*user_destination_token_account, false),
            AccountMeta::new_readonly(swap.from.transfer_authority, true),
        ];
        metas.extend(pool_metas(&swap.from, false));
        metas.extend(pool_metas(&swap.to, false));
        metas.push(AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false));
        let data = encode(
            RelayInstructionTag::TransitiveSwap,
            &TransitiveSwapArgs {
                amount_in: swap.from.amount_in,
                transit_minimum_amount: swap.from.minimum_amount_out,
                minimum_amount_out: swap.to.minimum_amount_out,
            },
        )?;
        Ok(self.instruction(metas, data))
    }

    fn instruction(&self, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Instruction {
        Instruction {
            program_id: self.id,
            accounts,
            data,
        }
    }
}

/// 单个池子的账户：程序、池子、权限、两侧金库、LP mint、手续费账户。
fn pool_metas(swap: &DirectSwapData, program_first: bool) -> Vec<AccountMeta> {
    let mut metas = Vec::with_capacity(7);
    if program_first {
        metas.push(AccountMeta::new_readonly(swap.program_id, false));
    }
    metas.extend([
        AccountMeta::new_readonly(swap.account, false),
        AccountMeta::new_readonly(swap.authority, false),
        AccountMeta::new(swap.source, false),
        AccountMeta::new(swap.destination, false),
        AccountMeta::new(swap.pool_token_mint, false),
        AccountMeta::new(swap.pool_fee_account, false),
    ]);
    if !program_first {
        metas.push(AccountMeta::new_readonly(swap.program_id, false));
    }
    metas
}

fn encode<T: BorshSerialize>(tag: RelayInstructionTag, args: &T) -> RelayResult<Vec<u8>> {
    let mut data = vec![tag as u8];
    args.serialize(&mut data)
        .map_err(|err| RelayError::instruction(format!("编码中继指令参数失败: {err}")))?;
    Ok(data)
}

//! 从已构建的指令反解参数，供断言使用。

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::instructions::ata::associated_token_address;
use crate::instructions::{
    ASSOCIATED_TOKEN_PROGRAM_ID, RelayProgram, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, WSOL_MINT,
};

const SYSTEM_CREATE_ACCOUNT_TAG: u32 = 0;
const SYSTEM_TRANSFER_TAG: u32 = 2;
const TOKEN_INITIALIZE_ACCOUNT_TAG: u8 = 1;
const TOKEN_CLOSE_ACCOUNT_TAG: u8 = 9;
const TOKEN_SWAP_TAG: u8 = 1;
const RELAY_TRANSFER_SOL_TAG: u8 = 2;

/// 识别出的临时 WSOL 账户开户序列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EphemeralWsol {
    pub account: Pubkey,
    pub owner: Pubkey,
    pub lamports: u64,
    /// 含可选的前置转账。
    pub consumed: usize,
}

fn read_u64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(..8)?.try_into().ok()?))
}

fn decode_system(instruction: &Instruction, tag: u32) -> Option<u64> {
    if instruction.program_id != SYSTEM_PROGRAM_ID || instruction.data.len() < 12 {
        return None;
    }
    let discriminant = u32::from_le_bytes(instruction.data[..4].try_into().ok()?);
    if discriminant != tag {
        return None;
    }
    read_u64(&instruction.data[4..])
}

pub fn decode_system_transfer(instruction: &Instruction) -> Option<u64> {
    decode_system(instruction, SYSTEM_TRANSFER_TAG)
}

/// 指令前缀是（可选转账 +）创建 + 初始化 WSOL 账户时返回其信息。
pub fn detect_ephemeral_open(instructions: &[Instruction]) -> Option<EphemeralWsol> {
    let offset = match instructions.first() {
        Some(first) if decode_system_transfer(first).is_some() => 1,
        _ => 0,
    };
    let create = instructions.get(offset)?;
    let lamports = decode_system(create, SYSTEM_CREATE_ACCOUNT_TAG)?;
    let account = create.accounts.get(1)?.pubkey;

    let initialize = instructions.get(offset + 1)?;
    if initialize.program_id != TOKEN_PROGRAM_ID
        || initialize.data.first().copied() != Some(TOKEN_INITIALIZE_ACCOUNT_TAG)
        || initialize.accounts.len() < 3
        || initialize.accounts[0].pubkey != account
        || initialize.accounts[1].pubkey != WSOL_MINT
    {
        return None;
    }

    Some(EphemeralWsol {
        account,
        owner: initialize.accounts[2].pubkey,
        lamports,
        consumed: offset + 2,
    })
}

/// 关闭 token 账户指令的 `(账户, 接收方)`。
pub fn detect_close_instruction(instruction: &Instruction) -> Option<(Pubkey, Pubkey)> {
    if instruction.program_id != TOKEN_PROGRAM_ID
        || instruction.data.first().copied() != Some(TOKEN_CLOSE_ACCOUNT_TAG)
        || instruction.accounts.len() < 3
    {
        return None;
    }
    Some((instruction.accounts[0].pubkey, instruction.accounts[1].pubkey))
}

/// token-swap `Swap` 的 `(amount_in, minimum_amount_out)`。
pub fn decode_swap(instruction: &Instruction) -> Option<(u64, u64)> {
    let (tag, rest) = instruction.data.split_first()?;
    if *tag != TOKEN_SWAP_TAG || rest.len() != 16 || instruction.accounts.len() != 10 {
        return None;
    }
    Some((read_u64(&rest[..8])?, read_u64(&rest[8..])?))
}

pub fn decode_transfer_sol(program: &RelayProgram, instruction: &Instruction) -> Option<u64> {
    if instruction.program_id != program.id() {
        return None;
    }
    let (tag, rest) = instruction.data.split_first()?;
    if *tag != RELAY_TRANSFER_SOL_TAG || rest.len() != 8 {
        return None;
    }
    read_u64(rest)
}

/// 创建 ATA 指令的 `(owner, ata)`；地址与派生结果不符时返回 `None`。
pub fn detect_create(instruction: &Instruction) -> Option<(Pubkey, Pubkey)> {
    if instruction.program_id != ASSOCIATED_TOKEN_PROGRAM_ID || instruction.accounts.len() < 6 {
        return None;
    }
    let ata = instruction.accounts[1].pubkey;
    let owner = instruction.accounts[2].pubkey;
    let mint = instruction.accounts[3].pubkey;
    (ata == associated_token_address(&owner, &mint)).then_some((owner, ata))
}

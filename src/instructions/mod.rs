//! 指令构建：中继程序、SPL token-swap、WSOL 临时账户生命周期与 ATA。

pub mod ata;
pub mod relay;
pub mod token_swap;
pub mod wsol;

use solana_sdk::pubkey::Pubkey;

pub const WSOL_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");
pub const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");
pub const RENT_SYSVAR_ID: Pubkey =
    solana_sdk::pubkey!("SysvarRent111111111111111111111111111111111");
pub const TOKEN_PROGRAM_ID: Pubkey = spl_token::ID;
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = spl_associated_token_account::ID;

pub use relay::RelayProgram;

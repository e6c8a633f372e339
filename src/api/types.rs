//! 中继后端的请求/响应结构。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use solana_sdk::message::MessageHeader;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::context::UsageStatus;
use crate::swap::{DirectSwapData, SwapData};

use super::serde_helpers::{field_as_string, u64_from_number_or_string};

/// 已签名交易的信封：账户以消息内索引引用，签名按签名者索引给出。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayTransactionRequest {
    pub instructions: Vec<RequestInstruction>,
    pub signatures: BTreeMap<u8, String>,
    pub pubkeys: Vec<String>,
    pub blockhash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestInstruction {
    pub program_id: u8,
    pub accounts: Vec<RequestAccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestAccountMeta {
    pub pubkey: u8,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl RelayTransactionRequest {
    /// 按编译后的消息构造信封；未签名（默认值）的签名位不上传。
    pub fn from_transaction(transaction: &Transaction) -> Self {
        let message = &transaction.message;
        let header = message.header;
        let key_count = message.account_keys.len();
        let meta = |index: u8| RequestAccountMeta {
            pubkey: index,
            is_signer: (index as usize) < header.num_required_signatures as usize,
            is_writable: is_writable_index(&header, index as usize, key_count),
        };

        let instructions = message
            .instructions
            .iter()
            .map(|compiled| RequestInstruction {
                program_id: compiled.program_id_index,
                accounts: compiled.accounts.iter().copied().map(meta).collect(),
                data: compiled.data.clone(),
            })
            .collect();

        let signatures = transaction
            .signatures
            .iter()
            .enumerate()
            .filter(|(_, signature)| **signature != Signature::default())
            .map(|(index, signature)| (index as u8, signature.to_string()))
            .collect();

        Self {
            instructions,
            signatures,
            pubkeys: message
                .account_keys
                .iter()
                .map(Pubkey::to_string)
                .collect(),
            blockhash: message.recent_blockhash.to_string(),
        }
    }
}

/// 消息头把账户分为四段：可写签名者、只读签名者、可写非签名者、只读非签名者。
fn is_writable_index(header: &MessageHeader, index: usize, key_count: usize) -> bool {
    let signed = header.num_required_signatures as usize;
    if index < signed {
        index < signed.saturating_sub(header.num_readonly_signed_accounts as usize)
    } else {
        let unsigned = key_count.saturating_sub(signed);
        index - signed < unsigned.saturating_sub(header.num_readonly_unsigned_accounts as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplSwapPayload {
    #[serde(with = "field_as_string")]
    pub program_id: Pubkey,
    #[serde(with = "field_as_string")]
    pub account_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub authority_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub transfer_authority_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub source_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub destination_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub pool_token_mint_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub pool_fee_account_pubkey: Pubkey,
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

impl From<&DirectSwapData> for SplSwapPayload {
    fn from(data: &DirectSwapData) -> Self {
        Self {
            program_id: data.program_id,
            account_pubkey: data.account,
            authority_pubkey: data.authority,
            transfer_authority_pubkey: data.transfer_authority,
            source_pubkey: data.source,
            destination_pubkey: data.destination,
            pool_token_mint_pubkey: data.pool_token_mint,
            pool_fee_account_pubkey: data.pool_fee_account,
            amount_in: data.amount_in,
            minimum_amount_out: data.minimum_amount_out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplTransitivePayload {
    pub from: SplSwapPayload,
    pub to: SplSwapPayload,
    #[serde(with = "field_as_string")]
    pub transit_token_mint_pubkey: Pubkey,
    pub needs_create_transit_token_account: bool,
}

/// 充值兑换数据：外部标签 `{"Spl": {...}}` 或 `{"SplTransitive": {...}}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SwapDataPayload {
    Spl(SplSwapPayload),
    SplTransitive(SplTransitivePayload),
}

impl From<&SwapData> for SwapDataPayload {
    fn from(data: &SwapData) -> Self {
        match data {
            SwapData::Direct(direct) => Self::Spl(direct.into()),
            SwapData::Transitive(transitive) => Self::SplTransitive(SplTransitivePayload {
                from: (&transitive.from).into(),
                to: (&transitive.to).into(),
                transit_token_mint_pubkey: transitive.transit_token_mint,
                needs_create_transit_token_account: transitive.needs_create_transit_token_account,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopUpSignatures {
    pub user_authority_signature: String,
    pub transfer_authority_signature: String,
}

/// 原始签名的充值兑换请求，由后端补上 fee payer 签名后上链。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopUpWithSwapRequest {
    #[serde(with = "field_as_string")]
    pub user_source_token_account_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub source_token_mint_pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub user_authority_pubkey: Pubkey,
    pub top_up_swap: SwapDataPayload,
    pub fee_amount: u64,
    pub signatures: TopUpSignatures,
    pub blockhash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeFeeLimitsResponse {
    pub limits: FreeFeeLimits,
    pub processed_fee: ProcessedFee,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeFeeLimits {
    #[serde(default = "default_true")]
    pub use_free_fee: bool,
    #[serde(deserialize_with = "u64_from_number_or_string::deserialize")]
    pub max_amount: u64,
    #[serde(deserialize_with = "u64_from_number_or_string::deserialize")]
    pub max_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessedFee {
    #[serde(deserialize_with = "u64_from_number_or_string::deserialize")]
    pub total_amount: u64,
    #[serde(deserialize_with = "u64_from_number_or_string::deserialize")]
    pub count: u64,
}

fn default_true() -> bool {
    true
}

impl From<FreeFeeLimitsResponse> for UsageStatus {
    fn from(response: FreeFeeLimitsResponse) -> Self {
        if !response.limits.use_free_fee {
            return UsageStatus {
                max_usage: 0,
                current_usage: response.processed_fee.count,
                max_amount: 0,
                amount_used: response.processed_fee.total_amount,
            };
        }
        UsageStatus {
            max_usage: response.limits.max_count,
            current_usage: response.processed_fee.count,
            max_amount: response.limits.max_amount,
            amount_used: response.processed_fee.total_amount,
        }
    }
}

/// 后端的结构化错误体。
#[derive(Debug, Clone, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

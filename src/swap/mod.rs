//! 兑换交易构建：用户兑换（1 或 2 笔交易）与中继账户充值兑换。

mod builder;
mod data;
mod top_up;

pub use builder::{
    SwapTransactionBuilder, SwapTransactionOutput, SwapTransactionRequest, TransferAuthority,
};
pub use data::{DirectSwapData, SwapData, TransitiveSwapData};
pub use top_up::{TopUpPreparedParams, TopUpTransaction, TopUpTransactionBuilder};

//! 以 SPL 代币支付网络费的 Solana 交易中继客户端。

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod fee;
pub mod identity;
pub mod instructions;
pub mod monitoring;
pub mod relay;
pub mod router;
pub mod rpc;
pub mod swap;
pub mod transaction;
pub mod transit;

#[cfg(test)]
mod test_support;

pub use api::{RelayApiClient, RelayApiError, RelayBackend};
pub use config::{RelayConfig, load_config};
pub use context::{RelayAccountStatus, RelayContext, RelayContextManager, UsageStatus};
pub use error::{RelayError, RelayResult};
pub use fee::{FeeAmount, calculate_expected_fee_for_top_up, calculate_needed_top_up_amount};
pub use identity::RelayIdentity;
pub use instructions::RelayProgram;
pub use relay::{FeeRelayer, RelayItem, RelayMode, RelayerOptions, RetryPolicy};
pub use router::{PoolRouter, PoolsPair, SwapPool};
pub use rpc::{ChainClient, RpcChainClient};
pub use swap::{
    SwapData, SwapTransactionBuilder, SwapTransactionOutput, SwapTransactionRequest,
    TopUpPreparedParams, TopUpTransactionBuilder, TransferAuthority,
};
pub use transaction::{PreparedTransaction, TokenAccount};
pub use transit::TransitTokenResolver;

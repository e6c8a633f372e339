//! TOML 配置。所有字段都有默认值，缺失的段落按默认值补齐。

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;
use crate::error::{RelayError, RelayResult};
use crate::instructions::RelayProgram;

pub(crate) fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

pub(crate) fn default_relay_api_url() -> String {
    "https://fee-relayer.solana.p2p.org".to_string()
}

pub(crate) fn default_slippage() -> f64 {
    0.01
}

pub(crate) fn default_network_retries() -> u32 {
    3
}

pub(crate) fn default_network_backoff_ms() -> u64 {
    500
}

pub(crate) fn default_pending_account_attempts() -> u32 {
    60
}

pub(crate) fn default_pending_account_interval_ms() -> u64 {
    1_000
}

pub(crate) fn default_request_ms() -> u64 {
    10_000
}

pub(crate) fn default_confirmation_ms() -> u64 {
    60_000
}

pub(crate) fn default_slow_request_warn_ms() -> u64 {
    2_000
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for cfg::NetworkConfig {
    fn default() -> Self {
        Self {
            cluster: cfg::Cluster::default(),
            rpc_url: default_rpc_url(),
            relay_api_url: default_relay_api_url(),
            relay_program_id: None,
        }
    }
}

impl Default for cfg::WalletConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
        }
    }
}

impl Default for cfg::SwapConfig {
    fn default() -> Self {
        Self {
            slippage: default_slippage(),
            delegate_transfer_authority: false,
        }
    }
}

impl Default for cfg::RetryConfig {
    fn default() -> Self {
        Self {
            network_retries: default_network_retries(),
            network_backoff_ms: default_network_backoff_ms(),
            pending_account_attempts: default_pending_account_attempts(),
            pending_account_interval_ms: default_pending_account_interval_ms(),
        }
    }
}

impl Default for cfg::TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_ms(),
            confirmation_ms: default_confirmation_ms(),
            slow_request_warn_ms: default_slow_request_warn_ms(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
            profile: cfg::LoggingProfile::default(),
            timezone_offset_hours: 0,
        }
    }
}

impl cfg::NetworkConfig {
    /// 显式配置的程序地址优先，否则按集群选择。
    pub fn relay_program(&self) -> RelayResult<RelayProgram> {
        match self.relay_program_id.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Pubkey::from_str(raw)
                .map(RelayProgram::new)
                .map_err(|err| {
                    RelayError::InvalidConfig(format!("relay_program_id `{raw}` 无法解析: {err}"))
                }),
            _ => Ok(match self.cluster {
                cfg::Cluster::Mainnet => RelayProgram::mainnet(),
                cfg::Cluster::Devnet => RelayProgram::devnet(),
            }),
        }
    }
}

impl cfg::RelayConfig {
    pub fn validate(&self) -> RelayResult<()> {
        if !(0.0..1.0).contains(&self.swap.slippage) {
            return Err(RelayError::InvalidConfig(format!(
                "swap.slippage 必须位于 [0, 1)，当前为 {}",
                self.swap.slippage
            )));
        }
        if self.network.relay_api_url.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "network.relay_api_url 不能为空".to_string(),
            ));
        }
        self.network.relay_program()?;
        Ok(())
    }
}

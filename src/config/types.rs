use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    #[default]
    Mainnet,
    Devnet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub cluster: Cluster,
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "super::default_relay_api_url")]
    pub relay_api_url: String,
    /// 覆盖按集群选择的中继程序地址。
    #[serde(default)]
    pub relay_program_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// 支持 JSON 字节数组、逗号分隔字节或 base58；环境变量优先。
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "super::default_slippage")]
    pub slippage: f64,
    /// 为每笔兑换生成临时 transfer authority 并 approve，而不是由用户直接签名。
    #[serde(default)]
    pub delegate_transfer_authority: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "super::default_network_retries")]
    pub network_retries: u32,
    #[serde(default = "super::default_network_backoff_ms")]
    pub network_backoff_ms: u64,
    #[serde(default = "super::default_pending_account_attempts")]
    pub pending_account_attempts: u32,
    #[serde(default = "super::default_pending_account_interval_ms")]
    pub pending_account_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "super::default_request_ms")]
    pub request_ms: u64,
    #[serde(default = "super::default_confirmation_ms")]
    pub confirmation_ms: u64,
    #[serde(default = "super::default_slow_request_warn_ms")]
    pub slow_request_warn_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingProfile {
    #[default]
    Lean,
    Verbose,
}

impl LoggingProfile {
    pub fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub profile: LoggingProfile,
    #[serde(default)]
    pub timezone_offset_hours: i8,
}

use std::env;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use crate::config::WalletConfig;
use crate::error::{RelayError, RelayResult};

pub const PRIVATE_KEY_ENV: &str = "FEE_RELAYER_PRIVATE_KEY";

/// 用户签名身份：中继交易的 owner 与 transfer authority。
#[derive(Clone)]
pub struct RelayIdentity {
    pub pubkey: Pubkey,
    pub signer: Arc<Keypair>,
}

impl std::fmt::Debug for RelayIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayIdentity")
            .field("pubkey", &self.pubkey)
            .finish_non_exhaustive()
    }
}

impl RelayIdentity {
    pub fn new(signer: Arc<Keypair>) -> Self {
        Self {
            pubkey: signer.pubkey(),
            signer,
        }
    }

    /// 环境变量优先，其次是配置；两者都缺失时视为未授权。
    pub fn from_wallet(wallet: &WalletConfig) -> RelayResult<Self> {
        let from_env = match env::var(PRIVATE_KEY_ENV) {
            Ok(value) => Some(value),
            Err(env::VarError::NotPresent) => None,
            Err(err) => {
                return Err(RelayError::InvalidConfig(format!(
                    "读取 {PRIVATE_KEY_ENV} 失败: {err}"
                )));
            }
        };
        Self::from_sources(from_env.as_deref(), wallet)
    }

    fn from_sources(env_value: Option<&str>, wallet: &WalletConfig) -> RelayResult<Self> {
        if let Some(value) = env_value.map(str::trim).filter(|value| !value.is_empty()) {
            let keypair = parse_keypair_string(value).map_err(|err| {
                RelayError::InvalidConfig(format!("环境变量 {PRIVATE_KEY_ENV} 非法: {err}"))
            })?;
            return Ok(Self::new(Arc::new(keypair)));
        }

        if !wallet.private_key.trim().is_empty() {
            let keypair = parse_keypair_string(wallet.private_key.trim()).map_err(|err| {
                RelayError::InvalidConfig(format!("配置 wallet.private_key 非法: {err}"))
            })?;
            return Ok(Self::new(Arc::new(keypair)));
        }

        Err(RelayError::Unauthorized)
    }
}

fn parse_keypair_string(raw: &str) -> Result<Keypair, anyhow::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("keypair string empty");
    }

    let bytes = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(trimmed)?
    } else if trimmed.contains(',') {
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<u8>)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        bs58::decode(trimmed).into_vec()?
    };
    Ok(Keypair::try_from(bytes.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(private_key: &str) -> WalletConfig {
        WalletConfig {
            private_key: private_key.to_string(),
        }
    }

    #[test]
    fn accepts_all_key_encodings() {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();
        let json = serde_json::to_string(&bytes.to_vec()).expect("json");
        let comma = bytes
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let base58 = bs58::encode(bytes).into_string();

        for encoded in [json, comma, base58] {
            let identity = RelayIdentity::from_sources(None, &wallet(&encoded)).expect("identity");
            assert_eq!(identity.pubkey, keypair.pubkey());
        }
    }

    #[test]
    fn env_value_takes_precedence() {
        let from_env = Keypair::new();
        let from_config = Keypair::new();
        let env_value = bs58::encode(from_env.to_bytes()).into_string();
        let config_value = bs58::encode(from_config.to_bytes()).into_string();
        let identity = RelayIdentity::from_sources(Some(&env_value), &wallet(&config_value))
            .expect("identity");
        assert_eq!(identity.pubkey, from_env.pubkey());
    }

    #[test]
    fn missing_key_is_unauthorized() {
        assert!(matches!(
            RelayIdentity::from_sources(Some("  "), &wallet("")),
            Err(RelayError::Unauthorized)
        ));
        assert!(matches!(
            RelayIdentity::from_sources(None, &wallet("not base58 !!")),
            Err(RelayError::InvalidConfig(_))
        ));
    }
}

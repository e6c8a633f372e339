use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::RelayConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["fee-relayer.toml", "config/fee-relayer.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// 显式路径优先；否则依次尝试默认路径，都不存在时返回默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<RelayConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            debug!(target: "relay::config", path = %candidate.display(), "已加载配置文件");
            return Ok(config);
        }
    }

    Ok(RelayConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<RelayConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

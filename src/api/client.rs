use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use tracing::{debug, info, warn};

use crate::config::{NetworkConfig, TimeoutConfig};
use crate::context::UsageStatus;
use crate::error::{RelayError, RelayResult};
use crate::monitoring::metrics::record_api_request;

use super::types::{BackendErrorBody, FreeFeeLimitsResponse};
use super::{RelayApiError, RelayBackend, RelayTransactionRequest, TopUpWithSwapRequest};

const MAX_ERROR_BODY_LEN: usize = 512;

#[derive(Clone)]
pub struct RelayApiClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
    slow_request_warn_ms: u64,
}

impl fmt::Debug for RelayApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayApiClient")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("slow_request_warn_ms", &self.slow_request_warn_ms)
            .finish()
    }
}

impl RelayApiClient {
    pub fn new(client: reqwest::Client, base_url: &str, timeouts: &TimeoutConfig) -> Self {
        let trimmed = base_url.trim();
        let normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        Self {
            base_url: normalized,
            client,
            request_timeout: Duration::from_millis(timeouts.request_ms),
            slow_request_warn_ms: timeouts.slow_request_warn_ms,
        }
    }

    pub fn from_config(network: &NetworkConfig, timeouts: &TimeoutConfig) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeouts.request_ms))
            .build()
            .map_err(|err| RelayError::Api(RelayApiError::Http(err)))?;
        Ok(Self::new(client, &network.relay_api_url, timeouts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_text(&self, stage: &'static str, path: &str) -> Result<String, RelayApiError> {
        let url = self.endpoint(path);
        debug!(target: "relay::api", stage, endpoint = %url, "开始请求中继后端");
        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .header(ACCEPT, HeaderValue::from_static("*/*"))
            .send()
            .await
            .map_err(|err| self.transport_error(stage, &url, err))?;
        let response = self.ensure_success(stage, &url, response).await?;
        let body = response.text().await.map_err(|err| {
            record_api_request(stage, "decode_error", None, None);
            RelayApiError::from(err)
        })?;
        self.finish(stage, &url, started);
        Ok(body)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        stage: &'static str,
        path: &str,
        payload: &T,
    ) -> Result<Value, RelayApiError> {
        let url = self.endpoint(path);
        debug!(target: "relay::api", stage, endpoint = %url, "开始请求中继后端");
        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(payload)
            .send()
            .await
            .map_err(|err| self.transport_error(stage, &url, err))?;
        let response = self.ensure_success(stage, &url, response).await?;
        let value: Value = response.json().await.map_err(|err| {
            record_api_request(stage, "decode_error", None, None);
            RelayApiError::from(err)
        })?;
        self.finish(stage, &url, started);
        Ok(value)
    }

    fn transport_error(&self, stage: &'static str, url: &str, err: reqwest::Error) -> RelayApiError {
        record_api_request(stage, "transport_error", None, None);
        if err.is_timeout() {
            RelayApiError::Timeout {
                endpoint: url.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
                source: err,
            }
        } else {
            RelayApiError::from(err)
        }
    }

    async fn ensure_success(
        &self,
        stage: &'static str,
        url: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RelayApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body_text = response
            .text()
            .await
            .unwrap_or_else(|err| format!("<body decode failed: {err}>"));
        record_api_request(stage, "http_error", None, Some(status));
        warn!(
            target: "relay::api",
            stage,
            status = status.as_u16(),
            endpoint = %url,
            body = %summarize_error_body(&body_text),
            "中继后端返回非 200 状态"
        );
        Err(classify_error_body(url, status, &body_text))
    }

    fn finish(&self, stage: &'static str, url: &str, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        record_api_request(stage, "success", Some(elapsed_ms), Some(StatusCode::OK));
        debug!(
            target: "relay::api",
            stage,
            endpoint = %url,
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "中继后端响应成功"
        );
        if elapsed_ms > self.slow_request_warn_ms as f64 {
            warn!(
                target: "relay::api",
                stage,
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                slow_threshold_ms = self.slow_request_warn_ms,
                "中继后端耗时超过告警阈值"
            );
        }
    }
}

#[async_trait]
impl RelayBackend for RelayApiClient {
    async fn fee_payer_address(&self) -> RelayResult<Pubkey> {
        let body = self.get_text("fee_payer", "/fee_payer/pubkey").await?;
        let text = body.trim().trim_matches('"');
        Pubkey::from_str(text).map_err(|err| {
            RelayError::Api(RelayApiError::Schema(format!(
                "fee payer 地址 `{text}` 无法解析: {err}"
            )))
        })
    }

    async fn usage_status(&self, owner: &Pubkey) -> RelayResult<UsageStatus> {
        let body = self
            .get_text("free_fee_limits", &format!("/free_fee_limits/{owner}"))
            .await?;
        let response: FreeFeeLimitsResponse =
            serde_json::from_str(&body).map_err(RelayApiError::from)?;
        Ok(response.into())
    }

    async fn relay_transaction(&self, transaction: &Transaction) -> RelayResult<String> {
        let request = RelayTransactionRequest::from_transaction(transaction);
        let value = self
            .post_json("relay_transaction", "/relay_transaction", &request)
            .await?;
        let signature = first_signature(value)?;
        info!(
            target: "relay::api",
            signature = %signature,
            instructions = request.instructions.len(),
            "中继交易已由后端提交"
        );
        Ok(signature)
    }

    async fn sign_relay_transaction(&self, transaction: &Transaction) -> RelayResult<String> {
        let request = RelayTransactionRequest::from_transaction(transaction);
        let value = self
            .post_json("sign_relay_transaction", "/sign_relay_transaction", &request)
            .await?;
        Ok(first_signature(value)?)
    }

    async fn relay_top_up_with_swap(&self, request: &TopUpWithSwapRequest) -> RelayResult<String> {
        let value = self
            .post_json("relay_top_up_with_swap", "/relay_top_up_with_swap", request)
            .await?;
        let signature = first_signature(value)?;
        info!(
            target: "relay::api",
            signature = %signature,
            owner = %request.user_authority_pubkey,
            fee_amount = request.fee_amount,
            "充值兑换已由后端提交"
        );
        Ok(signature)
    }
}

/// 后端以字符串或字符串数组返回签名。
fn first_signature(value: Value) -> Result<String, RelayApiError> {
    match value {
        Value::String(signature) => Ok(signature),
        Value::Array(items) => items
            .into_iter()
            .find_map(|item| item.as_str().map(str::to_string))
            .ok_or_else(|| RelayApiError::Schema("签名数组为空".to_string())),
        other => Err(RelayApiError::Schema(format!("无法识别的签名响应: {other}"))),
    }
}

fn classify_error_body(url: &str, status: StatusCode, body: &str) -> RelayApiError {
    match serde_json::from_str::<BackendErrorBody>(body) {
        Ok(parsed) if !parsed.message.is_empty() => RelayApiError::Backend {
            code: parsed.code,
            message: parsed.message,
            data: parsed.data,
        },
        _ => RelayApiError::ApiStatus {
            endpoint: url.to_string(),
            status,
            body: summarize_error_body(body),
        },
    }
}

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut single_line = trimmed.replace(['\n', '\r'], " ");
    if single_line.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !single_line.is_char_boundary(cut) {
            cut -= 1;
        }
        single_line.truncate(cut);
        single_line.push('…');
    }
    single_line
}

use metrics::{counter, histogram};
use reqwest::StatusCode;

/// 中继后端 HTTP 请求计数与耗时。
pub fn record_api_request(
    stage: &'static str,
    result: &'static str,
    elapsed_ms: Option<f64>,
    status: Option<StatusCode>,
) {
    let status_label = status
        .map(|code| code.as_u16().to_string())
        .unwrap_or_else(|| "none".to_string());
    counter!(
        "fee_relayer_api_requests_total",
        "stage" => stage,
        "result" => result,
        "status" => status_label.clone()
    )
    .increment(1);
    if let Some(ms) = elapsed_ms {
        histogram!(
            "fee_relayer_api_latency_ms",
            "stage" => stage,
            "status" => status_label
        )
        .record(ms);
    }
}

/// 充值兑换结果。
pub fn record_top_up(result: &'static str, amount: u64) {
    counter!("fee_relayer_top_ups_total", "result" => result).increment(1);
    if result == "success" {
        counter!("fee_relayer_top_up_lamports_total").increment(amount);
    }
}

/// 中继提交结果，`kind` 区分完整中继与仅签名。
pub fn record_relay(kind: &'static str, result: &'static str) {
    counter!(
        "fee_relayer_relays_total",
        "kind" => kind,
        "result" => result
    )
    .increment(1);
}

pub fn record_retry(policy: &'static str, operation: &'static str) {
    counter!(
        "fee_relayer_retries_total",
        "policy" => policy,
        "operation" => operation
    )
    .increment(1);
}

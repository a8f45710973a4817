use crate::errors::AurabotError;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build a `reqwest::Client` with a 10 s connect timeout and the given
/// overall request timeout.
///
/// Falls back to the default client if the builder fails.
pub fn default_http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Map a failed `reqwest` send into the error taxonomy.
///
/// Timeouts and connection failures are transient; everything else
/// (invalid URL, request construction) is not worth retrying.
pub fn transport_error(service: &str, err: &reqwest::Error) -> AurabotError {
    AurabotError::Transport {
        message: format!("{} request failed: {}", service, err),
        retryable: err.is_timeout() || err.is_connect(),
    }
}

/// Check HTTP status and decode the JSON body.
///
/// - 429 becomes `RateLimit` carrying the `Retry-After` header if present
/// - 401/403 become a non-retryable `Transport` (bad credentials)
/// - 500/502/503 become a retryable `Transport`
/// - other non-success statuses become a non-retryable `Transport`
/// - a success status with an undecodable body is a non-retryable `Transport`
pub async fn check_json_response(
    resp: Response,
    service: &str,
) -> Result<Value, AurabotError> {
    let status = resp.status();
    if !status.is_success() {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let detail = api_error_detail(&body);

        if status.as_u16() == 429 {
            warn!(service, retry_after = ?retry_after, "rate limit hit");
            return Err(AurabotError::RateLimit { retry_after });
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            warn!(service, status = status.as_u16(), "authentication rejected");
            return Err(AurabotError::Transport {
                message: format!(
                    "{} authentication failed, check the configured credentials: {}",
                    service, detail
                ),
                retryable: false,
            });
        }

        let retryable = matches!(status.as_u16(), 500 | 502 | 503);
        return Err(AurabotError::Transport {
            message: format!("{} API error ({}): {}", service, status.as_u16(), detail),
            retryable,
        });
    }

    resp.json().await.map_err(|e| AurabotError::Transport {
        message: format!("failed to decode {} response: {}", service, e),
        retryable: false,
    })
}

/// Pull `error.message` out of a JSON error body, falling back to the raw text.
fn api_error_detail(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body)
        && let Some(err) = json.get("error")
    {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        if let Some(kind) = err.get("type").and_then(|v| v.as_str()) {
            return format!("{}: {}", kind, message);
        }
        return message.to_string();
    }
    body.chars().take(500).collect()
}

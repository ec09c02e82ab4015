//! Shared reqwest plumbing for the HTTP-backed adapters.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{api_error, redact, ApiCredential, ProviderError};

/// Build the HTTP client an adapter keeps for its lifetime.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to build HTTP client: {}", e)))
}

/// Send a prepared request and decode a successful JSON body.
///
/// Non-success statuses are classified (401/403 auth, 429 rate limit,
/// everything else an API error) and all error text is redacted.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    credential: &ApiCredential,
    timeout: Duration,
) -> Result<T, ProviderError> {
    let response = request.timeout(timeout).send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Http(redact(&e.without_url().to_string(), credential))
        }
    })?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(api_error(status.as_u16(), &body, credential));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Parse(redact(&e.without_url().to_string(), credential)))
}

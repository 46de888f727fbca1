//! Anthropic token counting.

use crate::counter::{TokenCounter, ANTHROPIC};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// The Anthropic API base URL.
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";

/// The Anthropic API version.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const COUNT_TOKENS_PATH: &str = "v1/messages/count_tokens";

/// Default bound on one `count_tokens` request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CountTokensRequest<'a> {
    model: &'a str,
    messages: [CountTokensMessage<'a>; 1],
}

#[derive(Serialize)]
struct CountTokensMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CountTokensResponse {
    input_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Counts tokens with the Anthropic `count_tokens` endpoint.
pub struct AnthropicCounter {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl AnthropicCounter {
    /// Create a counter against the public API.
    pub fn new(api_key: Option<String>) -> ProviderResult<Self> {
        Self::with_base_url(api_key, ANTHROPIC_API_URL)
    }

    /// Create a counter with a custom base URL.
    ///
    /// The key is only checked when counting, so a counter can be built
    /// before credentials are known.
    pub fn with_base_url(api_key: Option<String>, base_url: &str) -> ProviderResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        let endpoint = base.join(COUNT_TOKENS_PATH)?;

        debug!(endpoint = %endpoint, "Creating Anthropic token counter");

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            warn!(timeout = ?self.timeout, "Anthropic count_tokens request timed out");
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::RequestFailed(error)
        }
    }

    async fn error_for(status: StatusCode, response: Response) -> ProviderError {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "Anthropic count_tokens request failed");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::invalid_api_key(ANTHROPIC)
            }
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
            _ => {
                let message = serde_json::from_str::<ErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                ProviderError::api_error(status.as_u16(), message)
            }
        }
    }
}

#[async_trait]
impl TokenCounter for AnthropicCounter {
    fn provider_id(&self) -> &str {
        ANTHROPIC
    }

    async fn count(&self, model: &str, text: &str) -> ProviderResult<u64> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_api_key(ANTHROPIC))?;
        let key =
            HeaderValue::from_str(api_key).map_err(|_| ProviderError::invalid_api_key(ANTHROPIC))?;

        let body = CountTokensRequest {
            model,
            messages: [CountTokensMessage {
                role: "user",
                content: text,
            }],
        };

        debug!(model, chars = text.len(), "Counting tokens");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-api-key", key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_for(status, response).await);
        }

        let raw = response.text().await.map_err(|e| self.request_error(e))?;
        let parsed: CountTokensResponse = serde_json::from_str(&raw).map_err(|e| {
            ProviderError::invalid_response(format!("missing input_tokens: {e}"))
        })?;

        debug!(model, tokens = parsed.input_tokens, "Token count received");
        Ok(parsed.input_tokens)
    }
}

//! Provider error types.

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while counting tokens.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Invalid API response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Missing API key.
    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    /// Invalid API key.
    #[error("Invalid API key for provider: {0}")]
    InvalidApiKey(String),

    /// The provider did not answer in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// API error with status code.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// No counter exists for the provider name.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ProviderError {
    /// Create a missing API key error.
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey(provider.into())
    }

    /// Create an invalid API key error.
    pub fn invalid_api_key(provider: impl Into<String>) -> Self {
        Self::InvalidApiKey(provider.into())
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Create an API error.
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Create an unsupported provider error.
    pub fn unsupported(provider: impl Into<String>) -> Self {
        Self::UnsupportedProvider(provider.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProviderError::missing_api_key("anthropic").to_string(),
            "Missing API key for provider: anthropic"
        );
        assert_eq!(
            ProviderError::api_error(500, "overloaded").to_string(),
            "API error (500): overloaded"
        );
        assert_eq!(
            ProviderError::unsupported("openai").to_string(),
            "Unsupported provider: openai"
        );
        assert_eq!(
            ProviderError::Timeout(Duration::from_secs(30)).to_string(),
            "Request timed out after 30s"
        );
        assert!(ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(3))
        }
        .to_string()
        .contains("3s"));
    }
}

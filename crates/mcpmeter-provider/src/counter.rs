//! Token counter interface and construction.

use crate::anthropic::AnthropicCounter;
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Provider id of the Anthropic counter.
pub const ANTHROPIC: &str = "anthropic";

/// Providers a counter can be created for.
pub const SUPPORTED_PROVIDERS: &[&str] = &[ANTHROPIC];

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";

/// Environment variable overriding the Anthropic base URL.
pub const BASE_URL_ENV_VAR: &str = "ANTHROPIC_BASE_URL";

/// Whether `name` is a provider with a counter implementation.
pub fn is_supported_provider(name: &str) -> bool {
    SUPPORTED_PROVIDERS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(name.trim()))
}

/// Estimates how many tokens a text costs for a model.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Provider this counter talks to.
    fn provider_id(&self) -> &str;

    /// Count the tokens of `text` as a single user message.
    async fn count(&self, model: &str, text: &str) -> ProviderResult<u64>;
}

/// Builds counters by provider name.
pub trait TokenCounterFactory: Send + Sync {
    fn create(&self, provider: &str) -> ProviderResult<Arc<dyn TokenCounter>>;
}

/// Factory for the built-in counters.
#[derive(Debug, Clone, Default)]
pub struct DefaultCounterFactory {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl DefaultCounterFactory {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self { api_key, base_url }
    }

    /// Read credentials from `ANTHROPIC_API_KEY` and `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(API_KEY_ENV_VAR).ok(),
            std::env::var(BASE_URL_ENV_VAR)
                .ok()
                .filter(|u| !u.trim().is_empty()),
        )
    }
}

impl TokenCounterFactory for DefaultCounterFactory {
    fn create(&self, provider: &str) -> ProviderResult<Arc<dyn TokenCounter>> {
        if !is_supported_provider(provider) {
            return Err(ProviderError::unsupported(provider));
        }

        debug!(provider, "Creating token counter");
        let counter = match &self.base_url {
            Some(base_url) => AnthropicCounter::with_base_url(self.api_key.clone(), base_url)?,
            None => AnthropicCounter::new(self.api_key.clone())?,
        };
        Ok(Arc::new(counter))
    }
}

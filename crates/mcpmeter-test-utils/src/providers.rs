//! Token counters with fixed answers.

use async_trait::async_trait;
use mcpmeter_provider::{
    is_supported_provider, ProviderError, ProviderResult, TokenCounter, TokenCounterFactory,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers with one count for tool input text and another for everything else.
///
/// Input text is recognized by its `Tool: ` prefix.
pub struct FixedTokenCounter {
    input: u64,
    response: u64,
    fail_with_missing_key: bool,
    seen: Mutex<Vec<(String, String)>>,
}

impl FixedTokenCounter {
    pub fn new(input: u64, response: u64) -> Self {
        Self {
            input,
            response,
            fail_with_missing_key: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A counter that fails every request as if no API key were configured.
    pub fn without_key() -> Self {
        Self {
            fail_with_missing_key: true,
            ..Self::new(0, 0)
        }
    }

    /// `(model, text)` pairs counted so far.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenCounter for FixedTokenCounter {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    async fn count(&self, model: &str, text: &str) -> ProviderResult<u64> {
        if self.fail_with_missing_key {
            return Err(ProviderError::missing_api_key("anthropic"));
        }
        self.seen
            .lock()
            .unwrap()
            .push((model.to_string(), text.to_string()));

        if text.starts_with("Tool: ") {
            Ok(self.input)
        } else {
            Ok(self.response)
        }
    }
}

/// Hands out one shared [`FixedTokenCounter`] for every supported provider.
pub struct FixedCounterFactory {
    counter: Arc<FixedTokenCounter>,
    created: AtomicUsize,
}

impl FixedCounterFactory {
    pub fn new(counter: FixedTokenCounter) -> Self {
        Self {
            counter: Arc::new(counter),
            created: AtomicUsize::new(0),
        }
    }

    pub fn counter(&self) -> &FixedTokenCounter {
        &self.counter
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl TokenCounterFactory for FixedCounterFactory {
    fn create(&self, provider: &str) -> ProviderResult<Arc<dyn TokenCounter>> {
        if !is_supported_provider(provider) {
            return Err(ProviderError::unsupported(provider));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let counter: Arc<dyn TokenCounter> = self.counter.clone();
        Ok(counter)
    }
}

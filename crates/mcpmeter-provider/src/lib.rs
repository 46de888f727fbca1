//! Token counting for mcpmeter.
//!
//! A [`TokenCounter`] turns `(model, text)` into a token count. Counters are
//! created by name through a [`TokenCounterFactory`]; Anthropic is the only
//! built-in provider.

pub mod analysis;
pub mod anthropic;
pub mod counter;
pub mod error;
pub mod model;

pub use analysis::{analyze_tool_call, tool_input_text, TokenBreakdown, DEFAULT_OVERHEAD};
pub use anthropic::AnthropicCounter;
pub use counter::{
    is_supported_provider, DefaultCounterFactory, TokenCounter, TokenCounterFactory, ANTHROPIC,
    SUPPORTED_PROVIDERS,
};
pub use error::{ProviderError, ProviderResult};
pub use model::{default_model, resolve_model, DEFAULT_MODEL};

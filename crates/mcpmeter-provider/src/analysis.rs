//! Token cost of a tool call and its response.

use crate::counter::TokenCounter;
use crate::error::ProviderResult;
use crate::model::resolve_model;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Default estimate of fixed framing cost per tool call.
pub const DEFAULT_OVERHEAD: u64 = 100;

/// Token estimate for one call/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBreakdown {
    pub provider: String,
    /// Resolved API model identifier.
    pub model: String,
    pub overhead: u64,
    pub input_tokens: u64,
    pub response_tokens: u64,
    pub total_tokens: u64,
}

/// Text counted as the input side of a tool call.
pub fn tool_input_text(tool: &str, args: &Value) -> String {
    let args = serde_json::to_string_pretty(args).unwrap_or_else(|_| args.to_string());
    format!("Tool: {tool}\nArguments: {args}")
}

/// Count input and response tokens and add the fixed overhead.
pub async fn analyze_tool_call(
    counter: &dyn TokenCounter,
    model: &str,
    overhead: u64,
    tool: &str,
    args: &Value,
    response_text: &str,
) -> ProviderResult<TokenBreakdown> {
    let model = resolve_model(model);

    let input_tokens = counter.count(&model, &tool_input_text(tool, args)).await?;
    let response_tokens = counter.count(&model, response_text).await?;
    let total_tokens = overhead
        .saturating_add(input_tokens)
        .saturating_add(response_tokens);

    debug!(
        provider = counter.provider_id(),
        model = %model,
        input_tokens,
        response_tokens,
        total_tokens,
        "Token analysis complete"
    );

    Ok(TokenBreakdown {
        provider: counter.provider_id().to_string(),
        model,
        overhead,
        input_tokens,
        response_tokens,
        total_tokens,
    })
}

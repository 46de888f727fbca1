//! Model name resolution.

/// Model used when neither the command line nor the environment names one.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Environment variable overriding [`DEFAULT_MODEL`].
pub const MODEL_ENV_VAR: &str = "ANTHROPIC_MODEL";

/// Friendly names and literal API identifiers, all mapped to API identifiers.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("claude-opus-4", "claude-opus-4-20250514"),
    ("claude-sonnet-4", "claude-sonnet-4-20250514"),
    ("claude-sonnet-3.7", "claude-3-7-sonnet-20250219"),
    ("claude-sonnet-3.5", "claude-3-5-sonnet-20241022"),
    ("claude-haiku-3.5", "claude-3-5-haiku-20241022"),
    ("claude-haiku-3", "claude-3-haiku-20240307"),
    ("claude-opus-3", "claude-3-opus-20240229"),
    ("claude-opus-4-20250514", "claude-opus-4-20250514"),
    ("claude-sonnet-4-20250514", "claude-sonnet-4-20250514"),
    ("claude-3-7-sonnet-20250219", "claude-3-7-sonnet-20250219"),
    ("claude-3-5-sonnet-20241022", "claude-3-5-sonnet-20241022"),
    ("claude-3-5-haiku-20241022", "claude-3-5-haiku-20241022"),
    ("claude-3-haiku-20240307", "claude-3-haiku-20240307"),
    ("claude-3-opus-20240229", "claude-3-opus-20240229"),
];

/// Map a model name to the identifier the API expects.
///
/// Lookup ignores case. Unknown names are returned unchanged.
pub fn resolve_model(name: &str) -> String {
    let key = name.trim().to_lowercase();
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Default model: `ANTHROPIC_MODEL` when set, else [`DEFAULT_MODEL`].
pub fn default_model() -> String {
    std::env::var(MODEL_ENV_VAR)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(resolve_model("claude-sonnet-4"), "claude-sonnet-4-20250514");
        assert_eq!(resolve_model("Claude-Haiku-3.5"), "claude-3-5-haiku-20241022");
        assert_eq!(
            resolve_model("claude-3-opus-20240229"),
            "claude-3-opus-20240229"
        );
    }

    #[test]
    fn test_unknown_model_passes_through() {
        assert_eq!(resolve_model("my-Custom-model"), "my-Custom-model");
        assert_eq!(resolve_model(""), "");
    }
}

//! Error types for the core crate.

use mcpmeter_mcp::McpError;
use mcpmeter_provider::ProviderError;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// MCP client error.
    #[error("{0}")]
    Mcp(#[from] McpError),

    /// Token counting error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Bad command-line or session input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// `tokens` was issued before any successful `call`.
    #[error("no previous tool call to analyze; use 'call' first")]
    NoPreviousCall,

    /// Operation not allowed in the current session phase.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Failure class used for reporting and exit codes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Config(_) => ErrorCategory::Configuration,
            CoreError::Mcp(e) => ErrorCategory::of_mcp(e),
            CoreError::Provider(_) => ErrorCategory::Provider,
            CoreError::Validation(_) | CoreError::NoPreviousCall | CoreError::InvalidState(_) => {
                ErrorCategory::Validation
            }
            CoreError::Io(_) | CoreError::Json(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the error ends an interactive session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Mcp(e) if e.is_fatal())
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON syntax or shape.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Named server is not configured.
    #[error("server not found: {name}")]
    ServerNotFound { name: String },

    /// No server named and no default configured.
    #[error("no server specified and no default server configured")]
    NoServerSelected,

    /// Config file could not be read or written.
    #[error("cannot access {path}: {message}")]
    Io { path: String, message: String },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Broad failure classes, each with its own process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Internal,
    Configuration,
    Validation,
    Connection,
    Provider,
}

impl ErrorCategory {
    /// Category of an MCP client failure.
    pub fn of_mcp(error: &McpError) -> Self {
        match error {
            McpError::InvalidConfig(_) => ErrorCategory::Configuration,
            McpError::Json(_) => ErrorCategory::Internal,
            _ => ErrorCategory::Connection,
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Internal => 1,
            ErrorCategory::Configuration => 2,
            ErrorCategory::Validation => 3,
            ErrorCategory::Connection => 4,
            ErrorCategory::Provider => 5,
        }
    }
}

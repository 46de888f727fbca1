//! MCP error types.

use thiserror::Error;

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Server definition is malformed or inconsistent with its type.
    #[error("Invalid server configuration: {0}")]
    InvalidConfig(String),

    /// Transport-level failure: spawn failed, connection refused, process exited.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed or non-compliant message from the peer.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Tool is not part of the last discovery result.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The server answered `tools/call` with a JSON-RPC error.
    #[error("Tool execution failed: {0}")]
    ToolError(String),

    /// A remote operation did not complete within its bound.
    #[error("Server timeout")]
    Timeout,

    /// The transport was already closed.
    #[error("Not connected")]
    NotConnected,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a protocol error.
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError(message.into())
    }

    /// Create a tool error.
    pub fn tool_error(message: impl Into<String>) -> Self {
        Self::ToolError(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error leaves the connection unusable.
    ///
    /// Fatal errors force an interactive session into its closed state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpError::ConnectionFailed(_)
                | McpError::ProtocolError(_)
                | McpError::Timeout
                | McpError::NotConnected
        )
    }
}

impl From<reqwest::Error> for McpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            McpError::Timeout
        } else if e.is_decode() {
            McpError::protocol_error(format!("Invalid response body: {e}"))
        } else {
            McpError::connection_failed(e.to_string())
        }
    }
}

impl From<std::io::Error> for McpError {
    fn from(e: std::io::Error) -> Self {
        McpError::connection_failed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                McpError::InvalidConfig("missing url".to_string()),
                "Invalid server configuration: missing url",
            ),
            (
                McpError::ToolNotFound("tool".to_string()),
                "Tool not found: tool",
            ),
            (
                McpError::ConnectionFailed("refused".to_string()),
                "Connection failed: refused",
            ),
            (
                McpError::ProtocolError("invalid".to_string()),
                "Protocol error: invalid",
            ),
            (
                McpError::ToolError("failed".to_string()),
                "Tool execution failed: failed",
            ),
            (McpError::Timeout, "Server timeout"),
            (McpError::NotConnected, "Not connected"),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(McpError::Timeout.is_fatal());
        assert!(McpError::connection_failed("eof").is_fatal());
        assert!(McpError::protocol_error("bad").is_fatal());
        assert!(McpError::NotConnected.is_fatal());

        assert!(!McpError::ToolNotFound("x".into()).is_fatal());
        assert!(!McpError::tool_error("bad args").is_fatal());
        assert!(!McpError::invalid_config("x").is_fatal());
    }

    #[test]
    fn test_error_from_io_is_connection_failure() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let mcp_err: McpError = io_err.into();
        assert!(matches!(mcp_err, McpError::ConnectionFailed(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let mcp_err: McpError = json_err.into();
        assert!(mcp_err.to_string().contains("JSON error"));
    }
}

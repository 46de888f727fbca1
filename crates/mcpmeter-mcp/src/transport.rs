//! MCP transport implementations.

use crate::error::McpResult;
use crate::http::HttpTransport;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::server::{ServerConfig, ServerType};
use crate::sse::SseTransport;
use crate::stdio::StdioTransport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for a response.
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse>;

    /// Send a notification (no response expected).
    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()>;

    /// Close the transport.
    async fn close(&self) -> McpResult<()>;

    /// Check if the transport is connected.
    fn is_connected(&self) -> bool;
}

/// Open the transport matching the server type.
///
/// `setup_timeout` bounds work done before the first JSON-RPC message, such
/// as waiting for the SSE endpoint announcement.
pub async fn open_transport(
    config: &ServerConfig,
    setup_timeout: Duration,
) -> McpResult<Arc<dyn Transport>> {
    config.validate()?;

    let transport: Arc<dyn Transport> = match config.server_type {
        ServerType::Stdio => Arc::new(StdioTransport::spawn(config)?),
        ServerType::Http => Arc::new(HttpTransport::new(config.endpoint()?)?),
        ServerType::Sse => Arc::new(SseTransport::connect(config.endpoint()?, setup_timeout).await?),
    };

    Ok(transport)
}

//! MCP client implementation.

use crate::error::{McpError, McpResult};
use crate::protocol::{
    is_supported_version, CallToolParams, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ToolCallResult, ToolDescriptor,
};
use crate::server::ServerConfig;
use crate::transport::{open_transport, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on `tools/list` pages followed in one discovery.
const MAX_TOOL_PAGES: usize = 64;

/// Bounds applied to remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// How long the `initialize` exchange may take before falling back.
    pub handshake_timeout: Duration,
    /// Bound for every later request.
    pub request_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// How far the server got through the MCP handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Handshake completed; discovery and validation are available.
    Standard {
        protocol_version: String,
        server_name: Option<String>,
    },
    /// Handshake failed but the transport is alive. Calls are best effort.
    Degraded { reason: String },
}

/// Opens connections to configured servers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ServerConfig) -> McpResult<McpConnection>;
}

/// MCP client that opens connections over the transport matching each server.
#[derive(Debug, Clone, Default)]
pub struct McpClient {
    options: ConnectOptions,
}

impl McpClient {
    /// Create a new MCP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client with custom timeouts.
    pub fn with_options(options: ConnectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ConnectOptions {
        self.options
    }

    /// Connect to a server and perform the MCP handshake.
    pub async fn connect(&self, config: &ServerConfig) -> McpResult<McpConnection> {
        info!(server = %config.name, server_type = %config.server_type, "Connecting to MCP server");
        let transport = open_transport(config, self.options.handshake_timeout).await?;
        McpConnection::establish(&config.name, transport, self.options).await
    }
}

#[async_trait]
impl Connector for McpClient {
    async fn connect(&self, config: &ServerConfig) -> McpResult<McpConnection> {
        McpClient::connect(self, config).await
    }
}

/// An open connection to one MCP server.
pub struct McpConnection {
    server: String,
    transport: Arc<dyn Transport>,
    mode: ConnectionMode,
    options: ConnectOptions,
    /// Result of the last successful discovery.
    tools: Vec<ToolDescriptor>,
    next_id: AtomicU64,
}

impl McpConnection {
    /// Run the handshake over an already opened transport.
    ///
    /// Transport failures are returned as errors and close the transport.
    /// Any other handshake failure yields a degraded connection.
    pub async fn establish(
        server: impl Into<String>,
        transport: Arc<dyn Transport>,
        options: ConnectOptions,
    ) -> McpResult<Self> {
        let mut connection = Self {
            server: server.into(),
            transport,
            mode: ConnectionMode::Degraded {
                reason: "handshake not attempted".to_string(),
            },
            options,
            tools: Vec::new(),
            next_id: AtomicU64::new(1),
        };

        connection.mode = match connection.initialize().await {
            Ok(mode) => mode,
            Err(e) => {
                if let Err(close_err) = connection.transport.close().await {
                    debug!(error = %close_err, "Error closing transport after failed handshake");
                }
                return Err(e);
            }
        };

        match &connection.mode {
            ConnectionMode::Standard {
                protocol_version,
                server_name,
            } => info!(
                server = %connection.server,
                protocol_version = %protocol_version,
                server_name = ?server_name,
                "MCP server initialized"
            ),
            ConnectionMode::Degraded { reason } => warn!(
                server = %connection.server,
                reason = %reason,
                "Server did not complete MCP handshake, continuing in degraded mode"
            ),
        }

        Ok(connection)
    }

    async fn initialize(&self) -> McpResult<ConnectionMode> {
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            "initialize",
            Some(serde_json::to_value(InitializeParams::default())?),
        );

        let outcome =
            tokio::time::timeout(self.options.handshake_timeout, self.transport.request(request))
                .await;

        let response = match outcome {
            Err(_) => {
                return Ok(degraded(format!(
                    "initialize timed out after {:?}",
                    self.options.handshake_timeout
                )))
            }
            Ok(Err(e)) if is_transport_failure(&e) => return Err(e),
            Ok(Err(e)) => return Ok(degraded(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let result = match parse_initialize(response) {
            Ok(result) => result,
            Err(reason) => return Ok(degraded(reason)),
        };

        let notification = JsonRpcNotification::new("notifications/initialized", None);
        let sent =
            tokio::time::timeout(self.options.request_timeout, self.transport.notify(notification))
                .await;
        match sent {
            Ok(Err(e)) if is_transport_failure(&e) => return Err(e),
            Ok(Err(e)) => warn!(error = %e, "Failed to send initialized notification"),
            Err(_) => warn!("Timed out sending initialized notification"),
            Ok(Ok(())) => {}
        }

        Ok(ConnectionMode::Standard {
            protocol_version: result.protocol_version,
            server_name: result.server_info.map(|info| info.name),
        })
    }

    /// Name of the server this connection talks to.
    pub fn server_name(&self) -> &str {
        &self.server
    }

    pub fn mode(&self) -> &ConnectionMode {
        &self.mode
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.mode, ConnectionMode::Degraded { .. })
    }

    /// Whether the underlying transport is still usable.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Tools from the last successful discovery.
    pub fn cached_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send(&self, method: &str, params: Option<Value>) -> McpResult<JsonRpcResponse> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        tokio::time::timeout(self.options.request_timeout, self.transport.request(request))
            .await
            .map_err(|_| McpError::Timeout)?
    }

    /// Discover the server's tools.
    ///
    /// Degraded connections report a single synthetic `unknown` tool without
    /// contacting the server. A JSON-RPC error answer to `tools/list` moves
    /// the connection into degraded mode.
    pub async fn list_tools(&mut self) -> McpResult<Vec<ToolDescriptor>> {
        if self.is_degraded() {
            return Ok(vec![ToolDescriptor::unknown()]);
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let response = self.send("tools/list", params).await?;
            if let Some(error) = &response.error {
                let reason = format!(
                    "tools/list rejected: {} (code {})",
                    error.message, error.code
                );
                warn!(server = %self.server, reason = %reason, "Tool discovery unsupported, continuing in degraded mode");
                self.mode = degraded(reason);
                self.tools.clear();
                return Ok(vec![ToolDescriptor::unknown()]);
            }

            let result = response.into_result()?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| McpError::protocol_error(format!("Invalid tools/list result: {e}")))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        if cursor.is_some() {
            warn!(server = %self.server, "Stopped following tools/list pagination");
        }

        info!(server = %self.server, tool_count = tools.len(), "Discovered MCP tools");
        self.tools = tools.clone();
        Ok(tools)
    }

    /// Invoke a tool.
    ///
    /// In standard mode the tool must appear in the last discovery result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallResult> {
        if self.is_degraded() {
            return self.call_tool_raw(name, arguments).await;
        }

        if !self.tools.iter().any(|t| t.name == name) {
            return Err(McpError::ToolNotFound(name.to_string()));
        }

        debug!(tool = name, server = %self.server, "Calling MCP tool");

        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let response = self
            .send("tools/call", Some(serde_json::to_value(&params)?))
            .await?;

        if let Some(error) = response.error {
            return Err(McpError::tool_error(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }

        let result = response
            .result
            .ok_or_else(|| McpError::protocol_error("Missing tools/call result"))?;
        ToolCallResult::from_result(result)
    }

    /// Best-effort invocation for servers that skipped the handshake.
    async fn call_tool_raw(&self, name: &str, arguments: Value) -> McpResult<ToolCallResult> {
        debug!(tool = name, server = %self.server, "Calling tool on degraded connection");

        let params = json!({ "name": name, "arguments": arguments });
        let response = self.send("tools/call", Some(params)).await?;

        let raw = match (response.result, response.error) {
            (Some(result), _) => result,
            (None, Some(error)) => serde_json::to_value(error)?,
            (None, None) => Value::Null,
        };
        Ok(ToolCallResult::non_standard(raw))
    }

    /// Close the connection.
    ///
    /// Bounded by the request timeout. A peer that does not acknowledge the
    /// shutdown in time is treated as closed.
    pub async fn disconnect(self) -> McpResult<()> {
        info!(server = %self.server, "Disconnecting from MCP server");
        match tokio::time::timeout(self.options.request_timeout, self.transport.close()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    server = %self.server,
                    timeout = ?self.options.request_timeout,
                    "Server did not acknowledge shutdown in time, treating as closed"
                );
                Ok(())
            }
        }
    }
}

fn degraded(reason: impl Into<String>) -> ConnectionMode {
    ConnectionMode::Degraded {
        reason: reason.into(),
    }
}

fn is_transport_failure(error: &McpError) -> bool {
    matches!(
        error,
        McpError::ConnectionFailed(_) | McpError::NotConnected | McpError::InvalidConfig(_)
    )
}

fn parse_initialize(response: JsonRpcResponse) -> Result<InitializeResult, String> {
    let result = response.into_result().map_err(|e| e.to_string())?;
    let result: InitializeResult = serde_json::from_value(result)
        .map_err(|e| format!("malformed initialize result: {e}"))?;
    if !is_supported_version(&result.protocol_version) {
        return Err(format!(
            "unsupported protocol version '{}'",
            result.protocol_version
        ));
    }
    Ok(result)
}

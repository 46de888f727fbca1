//! In-memory MCP peers.

use async_trait::async_trait;
use mcpmeter_mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use mcpmeter_mcp::{
    ConnectOptions, Connector, McpConnection, McpError, McpResult, ServerConfig, Transport,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How the mock answers one method.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with a `result`.
    Result(Value),
    /// Answer with a JSON-RPC error.
    RpcError { code: i64, message: String },
    /// Fail as if the peer went away. The transport stays disconnected.
    Disconnect,
    /// Never answer.
    Silent,
}

impl MockReply {
    pub fn rpc_error(code: i64, message: impl Into<String>) -> Self {
        Self::RpcError {
            code,
            message: message.into(),
        }
    }
}

struct Inner {
    replies: Mutex<HashMap<String, MockReply>>,
    requests: Mutex<Vec<JsonRpcRequest>>,
    notifications: Mutex<Vec<JsonRpcNotification>>,
    connected: AtomicBool,
    closes: AtomicUsize,
    hang_on_close: AtomicBool,
}

/// A scripted transport that records everything sent to it.
///
/// Clones share state, so a test can keep one handle while the connection
/// owns another.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A peer that answers every method with "method not found".
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                replies: Mutex::new(HashMap::new()),
                requests: Mutex::new(Vec::new()),
                notifications: Mutex::new(Vec::new()),
                connected: AtomicBool::new(true),
                closes: AtomicUsize::new(0),
                hang_on_close: AtomicBool::new(false),
            }),
        }
    }

    /// A well-behaved server offering the named tools.
    ///
    /// Every `tools/call` answers with the text `ok` until changed with
    /// [`MockTransport::with_tool_result`].
    pub fn compliant(tools: &[&str]) -> Self {
        let tools: Vec<Value> = tools
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "description": format!("Mock tool {name}"),
                    "inputSchema": {"type": "object"}
                })
            })
            .collect();

        Self::new()
            .with_reply(
                "initialize",
                MockReply::Result(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "mock-server", "version": "1.0.0"}
                })),
            )
            .with_reply("tools/list", MockReply::Result(json!({ "tools": tools })))
            .with_tool_result(json!({
                "content": [{"type": "text", "text": "ok"}],
                "isError": false
            }))
    }

    pub fn with_reply(self, method: &str, reply: MockReply) -> Self {
        self.set_reply(method, reply);
        self
    }

    pub fn with_tool_result(self, result: Value) -> Self {
        self.with_reply("tools/call", MockReply::Result(result))
    }

    /// Never finish `close`, like a peer that ignores the shutdown request.
    pub fn with_hanging_close(self) -> Self {
        self.inner.hang_on_close.store(true, Ordering::SeqCst);
        self
    }

    /// Change a reply after the transport has been handed out.
    pub fn set_reply(&self, method: &str, reply: MockReply) {
        self.inner
            .replies
            .lock()
            .unwrap()
            .insert(method.to_string(), reply);
    }

    pub fn requests(&self) -> Vec<JsonRpcRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// Number of requests received for `method`.
    pub fn request_count(&self, method: &str) -> usize {
        self.inner
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.inner
            .notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.method.clone())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    fn reopen(&self) {
        self.inner.connected.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        if !self.is_connected() {
            return Err(McpError::connection_failed("mock peer is gone"));
        }

        let id = request.id.unwrap_or_default();
        let reply = self
            .inner
            .replies
            .lock()
            .unwrap()
            .get(&request.method)
            .cloned();
        self.inner.requests.lock().unwrap().push(request);

        match reply {
            Some(MockReply::Result(result)) => Ok(JsonRpcResponse::success(id, result)),
            Some(MockReply::RpcError { code, message }) => {
                Ok(JsonRpcResponse::failure(id, code, message))
            }
            Some(MockReply::Disconnect) => {
                self.inner.connected.store(false, Ordering::SeqCst);
                Err(McpError::connection_failed("mock peer exited"))
            }
            Some(MockReply::Silent) => std::future::pending().await,
            None => Ok(JsonRpcResponse::failure(id, -32601, "Method not found")),
        }
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::connection_failed("mock peer is gone"));
        }
        self.inner.notifications.lock().unwrap().push(notification);
        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        if self.inner.hang_on_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}

/// Connects every server to the same [`MockTransport`].
pub struct MockConnector {
    transport: Option<MockTransport>,
    options: ConnectOptions,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport: Some(transport),
            options: ConnectOptions::default(),
            connects: AtomicUsize::new(0),
        }
    }

    /// A connector whose servers are never reachable.
    pub fn refusing() -> Self {
        Self {
            transport: None,
            options: ConnectOptions::default(),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn with_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &ServerConfig) -> McpResult<McpConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let transport = self.transport.clone().ok_or_else(|| {
            McpError::connection_failed(format!("Connection refused: {}", config.target()))
        })?;
        transport.reopen();

        McpConnection::establish(&config.name, Arc::new(transport), self.options).await
    }
}

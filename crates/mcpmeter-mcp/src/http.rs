//! Streamable HTTP transport for remote MCP servers.
//!
//! Every message is an HTTP POST to a single endpoint. The server answers
//! with either a JSON body or an SSE stream that carries the response.

use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::sse_codec::SseDecoder;
use crate::transport::Transport;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Header carrying the server-assigned session.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Bound on the session-terminating `DELETE`.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Streamable HTTP transport.
pub struct HttpTransport {
    endpoint: Url,
    client: Client,
    closed: AtomicBool,
    /// Session assigned by the server during initialization.
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(endpoint: Url) -> McpResult<Self> {
        let client = Client::builder().build().map_err(|e| {
            McpError::connection_failed(format!("Failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            endpoint,
            client,
            closed: AtomicBool::new(false),
            session_id: RwLock::new(None),
        })
    }

    /// Current session id, if the server assigned one.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Build request with common headers.
    async fn build_request(&self, body: String) -> RequestBuilder {
        let mut req = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(body);

        if let Some(session) = self.session_id.read().await.as_deref() {
            req = req.header(SESSION_HEADER, session);
        }

        req
    }

    async fn post(&self, body: String) -> McpResult<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::NotConnected);
        }

        let response = self.build_request(body).await.send().await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut current = self.session_id.write().await;
            if current.as_deref() != Some(session) {
                debug!(session, "MCP session assigned");
                *current = Some(session.to_string());
            }
        }

        Ok(response)
    }

    /// Extract the response for `id` from an HTTP response.
    async fn read_response(&self, id: u64, response: Response) -> McpResult<JsonRpcResponse> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(McpError::protocol_error(format!(
                "Server returned {status}: {text}"
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            return read_event_stream(id, response).await;
        }

        let text = response
            .text()
            .await
            .map_err(|e| McpError::protocol_error(format!("Failed to read response: {e}")))?;
        if text.trim().is_empty() {
            return Err(McpError::protocol_error(format!(
                "Server returned {status} without a response body"
            )));
        }

        let message: Value = serde_json::from_str(&text)
            .map_err(|e| McpError::protocol_error(format!("Invalid JSON response: {e}")))?;
        JsonRpcResponse::from_message(&message)
            .ok_or_else(|| McpError::protocol_error("Body is not a JSON-RPC response"))
    }
}

/// Scan an SSE body for the response matching `id`.
async fn read_event_stream(id: u64, response: Response) -> McpResult<JsonRpcResponse> {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| McpError::connection_failed(format!("Stream error: {e}")))?;
        for event in decoder.push(&chunk) {
            if let Some(found) = match_response(id, &event.data) {
                return Ok(found);
            }
        }
    }

    if let Some(event) = decoder.finish() {
        if let Some(found) = match_response(id, &event.data) {
            return Ok(found);
        }
    }

    Err(McpError::protocol_error("SSE stream ended without response"))
}

fn match_response(id: u64, data: &str) -> Option<JsonRpcResponse> {
    let message: Value = serde_json::from_str(data).ok()?;
    match JsonRpcResponse::from_message(&message) {
        Some(response) if response.id == Some(id) => Some(response),
        Some(response) => {
            warn!(id = ?response.id, "Discarding response for another request");
            None
        }
        None => {
            debug!("Ignoring server message on response stream");
            None
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let id = request
            .id
            .ok_or_else(|| McpError::protocol_error("Request is missing an id"))?;
        let body = serde_json::to_string(&request)?;

        debug!(id, method = %request.method, "Sending HTTP request");

        let response = self.post(body).await?;
        self.read_response(id, response).await
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        let body = serde_json::to_string(&notification)?;

        debug!(method = %notification.method, "Sending HTTP notification");

        let response = self.post(body).await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Notification returned non-success status");
        }

        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(session) = self.session_id.write().await.take() {
            let result = self
                .client
                .delete(self.endpoint.clone())
                .header(SESSION_HEADER, &session)
                .timeout(SHUTDOWN_TIMEOUT)
                .send()
                .await;
            if let Err(e) = result {
                debug!(error = %e, "Failed to terminate MCP session");
            }
        }

        debug!("Closed HTTP transport");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

//! SSE (Server-Sent Events) transport for remote MCP servers.
//!
//! This implements the HTTP+SSE transport, which uses:
//! - a long-lived GET event stream for receiving responses and events
//! - HTTP POST to the announced endpoint for sending messages

use crate::correlation::PendingRequests;
use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::sse_codec::SseDecoder;
use crate::transport::Transport;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// SSE transport for remote MCP servers.
pub struct SseTransport {
    post_url: Url,
    client: Client,
    pending: Arc<PendingRequests>,
    closed: AtomicBool,
    listener: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream and wait for the endpoint announcement.
    pub async fn connect(base: Url, setup_timeout: Duration) -> McpResult<Self> {
        let client = Client::builder().build().map_err(|e| {
            McpError::connection_failed(format!("Failed to create HTTP client: {e}"))
        })?;

        debug!(url = %base, "Opening SSE stream");

        let response = tokio::time::timeout(
            setup_timeout,
            client
                .get(base.clone())
                .header("Accept", "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| McpError::connection_failed(format!("Timed out opening {base}")))??;

        let status = response.status();
        if !status.is_success() {
            return Err(McpError::connection_failed(format!(
                "Event stream returned {status}"
            )));
        }

        let pending = PendingRequests::new();
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let listener = tokio::spawn(listen(response, endpoint_tx, Arc::clone(&pending)));

        let endpoint = match tokio::time::timeout(setup_timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                return Err(McpError::connection_failed(
                    "Event stream ended before the endpoint was announced",
                ))
            }
            Err(_) => {
                listener.abort();
                return Err(McpError::connection_failed(
                    "Server did not announce a message endpoint",
                ));
            }
        };

        let post_url = base.join(&endpoint).map_err(|e| {
            listener.abort();
            McpError::protocol_error(format!("Invalid endpoint '{endpoint}': {e}"))
        })?;

        info!(url = %base, endpoint = %post_url, "SSE stream established");

        Ok(Self {
            post_url,
            client,
            pending,
            closed: AtomicBool::new(false),
            listener,
        })
    }

    /// URL messages are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.post_url
    }

    async fn post(&self, body: String) -> McpResult<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::NotConnected);
        }

        let response = self
            .client
            .post(self.post_url.clone())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        Ok(response)
    }
}

/// Read the event stream until it ends, routing messages to waiters.
async fn listen(
    response: Response,
    endpoint_tx: oneshot::Sender<String>,
    pending: Arc<PendingRequests>,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "SSE stream error");
                break;
            }
        };

        for event in decoder.push(&chunk) {
            match event.event.as_str() {
                "endpoint" => match endpoint_tx.take() {
                    Some(tx) => {
                        let _ = tx.send(event.data.trim().to_string());
                    }
                    None => debug!("Ignoring repeated endpoint event"),
                },
                "message" => route_message(&event.data, &pending),
                other => debug!(event = other, "Ignoring SSE event"),
            }
        }
    }

    debug!("SSE stream ended");
    pending.close("Event stream ended");
}

fn route_message(data: &str, pending: &PendingRequests) {
    let message: Value = match serde_json::from_str(data) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Discarding malformed SSE message");
            return;
        }
    };

    match JsonRpcResponse::from_message(&message) {
        Some(response) => {
            pending.resolve(response);
        }
        None => debug!("Ignoring server-initiated message"),
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::NotConnected);
        }
        let id = request
            .id
            .ok_or_else(|| McpError::protocol_error("Request is missing an id"))?;

        debug!(id, method = %request.method, "Sending SSE request");

        let waiter = self.pending.register(id)?;
        let response = self.post(serde_json::to_string(&request)?).await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(McpError::protocol_error(format!(
                "Server returned {status}: {text}"
            )));
        }

        waiter.wait().await
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        debug!(method = %notification.method, "Sending SSE notification");

        let response = self.post(serde_json::to_string(&notification)?).await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Notification returned non-success status");
        }

        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.listener.abort();
        self.pending.close("Transport closed");
        debug!("Closed SSE transport");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.pending.is_closed()
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_connection_refused() {
        let base = Url::parse("http://127.0.0.1:1/sse").unwrap();
        let err = SseTransport::connect(base, Duration::from_secs(2))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_route_message_resolves_waiter() {
        let pending = PendingRequests::new();
        let waiter = pending.register(11).unwrap();

        route_message("not json", &pending);
        route_message(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#, &pending);
        route_message(r#"{"jsonrpc":"2.0","id":11,"result":{"ok":1}}"#, &pending);

        let response = waiter.wait().await.unwrap();
        assert_eq!(response.result, Some(json!({"ok": 1})));
    }
}

//! stdio transport for local MCP servers.
//!
//! Messages are newline-delimited JSON-RPC over the child's stdin/stdout.

use crate::correlation::PendingRequests;
use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::server::ServerConfig;
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Transport over a spawned child process.
pub struct StdioTransport {
    server: String,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    pending: Arc<PendingRequests>,
    shut_down: AtomicBool,
    reader: JoinHandle<()>,
    stderr: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Spawn the configured program and start the read pump.
    pub fn spawn(config: &ServerConfig) -> McpResult<Self> {
        let program = config.program().ok_or_else(|| {
            McpError::invalid_config(format!(
                "stdio server '{}' requires a command or path",
                config.name
            ))
        })?;

        let mut cmd = Command::new(program);
        cmd.args(&config.args)
            .envs(&config.env_vars)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(server = %config.name, command = program, args = ?config.args, "Starting MCP server");

        let mut child = cmd.spawn().map_err(|e| {
            McpError::connection_failed(format!("Failed to start '{program}': {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::connection_failed("Failed to get stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::connection_failed("Failed to get stdout"))?;

        let pending = PendingRequests::new();
        let reader = tokio::spawn(read_pump(
            config.name.clone(),
            stdout,
            Arc::clone(&pending),
        ));
        let stderr = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_stderr(config.name.clone(), stderr)));

        info!(server = %config.name, pid = ?child.id(), "MCP server process started");

        Ok(Self {
            server: config.name.clone(),
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            pending,
            shut_down: AtomicBool::new(false),
            reader,
            stderr,
        })
    }

    fn ensure_open(&self) -> McpResult<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(McpError::NotConnected);
        }
        Ok(())
    }

    async fn write_line(&self, line: &str) -> McpResult<()> {
        trace!(server = %self.server, message = line, "-> stdio");

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(McpError::NotConnected)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Route stdout lines to their waiters until the child closes stdout.
async fn read_pump<R>(server: String, stdout: R, pending: Arc<PendingRequests>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                trace!(server = %server, message = line, "<- stdio");

                match serde_json::from_str::<Value>(line) {
                    Ok(message) => match JsonRpcResponse::from_message(&message) {
                        Some(response) => {
                            pending.resolve(response);
                        }
                        None => debug!(server = %server, "Ignoring server-initiated message"),
                    },
                    Err(e) => debug!(server = %server, error = %e, "Ignoring non-JSON stdout line"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(server = %server, error = %e, "Failed to read server stdout");
                break;
            }
        }
    }

    debug!(server = %server, "MCP server closed stdout");
    pending.close(format!("Server '{server}' exited"));
}

async fn forward_stderr<R>(server: String, stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(server = %server, "stderr: {line}");
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        self.ensure_open()?;
        let id = request
            .id
            .ok_or_else(|| McpError::protocol_error("Request is missing an id"))?;

        debug!(server = %self.server, id, method = %request.method, "Sending stdio request");

        let waiter = self.pending.register(id)?;
        let line = serde_json::to_string(&request)?;
        self.write_line(&line).await?;
        waiter.wait().await
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        self.ensure_open()?;
        if self.pending.is_closed() {
            return Err(McpError::connection_failed(format!(
                "Server '{}' exited",
                self.server
            )));
        }

        debug!(server = %self.server, method = %notification.method, "Sending stdio notification");
        let line = serde_json::to_string(&notification)?;
        self.write_line(&line).await
    }

    async fn close(&self) -> McpResult<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Closing stdin lets well-behaved servers exit on their own.
        drop(self.stdin.lock().await.take());

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(server = %self.server, error = %e, "Server process already gone");
            }
            match child.wait().await {
                Ok(status) => debug!(server = %self.server, %status, "MCP server process reaped"),
                Err(e) => warn!(server = %self.server, error = %e, "Failed to reap server process"),
            }
        }

        self.reader.abort();
        if let Some(task) = &self.stderr {
            task.abort();
        }
        self.pending.close("Transport closed");

        debug!(server = %self.server, "Closed stdio transport");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst) && !self.pending.is_closed()
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(task) = &self.stderr {
            task.abort();
        }
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(child) = guard.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

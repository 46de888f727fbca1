//! Model Context Protocol (MCP) client for mcpmeter.
//!
//! Connects to a single MCP server, discovers its tools and invokes them.
//!
//! # Supported Transports
//!
//! - **stdio**: Local servers via stdin/stdout
//! - **http**: Remote servers via streamable HTTP
//! - **sse**: Remote servers via HTTP+SSE
//!
//! Servers that do not complete the MCP handshake are still usable in a
//! degraded mode: discovery reports a single `unknown` tool and calls are
//! forwarded as-is.
//!
//! # Example
//!
//! ```no_run
//! use mcpmeter_mcp::{McpClient, ServerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::stdio(
//!     "filesystem",
//!     "npx",
//!     ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"],
//! );
//!
//! let client = McpClient::new();
//! let mut connection = client.connect(&config).await?;
//!
//! let tools = connection.list_tools().await?;
//! println!("{} tools", tools.len());
//!
//! let result = connection
//!     .call_tool("read_file", serde_json::json!({ "path": "/tmp/notes.txt" }))
//!     .await?;
//! println!("{}", result.flatten());
//!
//! connection.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod correlation;
mod error;
pub mod http;
pub mod protocol;
mod server;
pub mod sse;
pub mod sse_codec;
pub mod stdio;
mod transport;

pub use client::{ConnectOptions, ConnectionMode, Connector, McpClient, McpConnection};
pub use error::{McpError, McpResult};
pub use protocol::{ContentBlock, ToolCallResult, ToolDescriptor};
pub use server::{ServerConfig, ServerType};
pub use transport::{open_transport, Transport};

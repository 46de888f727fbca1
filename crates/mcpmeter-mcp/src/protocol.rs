//! MCP protocol types.
//!
//! Implements the JSON-RPC based MCP protocol.
//! See: <https://modelcontextprotocol.io/>

use crate::error::{McpError, McpResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol version announced by this client.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol versions this client can talk to.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Placeholder emitted in place of binary payloads when flattening results.
pub const BINARY_PLACEHOLDER: &str = "[binary content omitted]";

/// Name of the descriptor synthesized for servers without discovery.
pub const UNKNOWN_TOOL_NAME: &str = "unknown";

/// Check whether a negotiated protocol version is one we understand.
pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// JSON-RPC request (or notification if id is None).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Request ID. None for notifications (which don't expect a response).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Check if this is a notification (no response expected).
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Null only for errors the peer could not attribute to a request.
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a successful response.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Interpret an incoming message as a response.
    ///
    /// Returns `None` for server-initiated requests and notifications, which
    /// carry a `method`, and for anything that is not a JSON-RPC response.
    pub fn from_message(message: &Value) -> Option<Self> {
        let object = message.as_object()?;
        if object.contains_key("method") {
            return None;
        }
        if !object.contains_key("result") && !object.contains_key("error") {
            return None;
        }
        serde_json::from_value(message.clone()).ok()
    }

    /// Return the result value, or the peer's error as a protocol error.
    pub fn into_result(self) -> McpResult<Value> {
        if let Some(error) = self.error {
            return Err(McpError::protocol_error(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        self.result
            .ok_or_else(|| McpError::protocol_error("Response has neither result nor error"))
    }
}

/// JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC notification (no id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// MCP initialization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    pub client_info: ClientInfo,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::default(),
        }
    }
}

/// Client capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
}

/// Roots capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    pub list_changed: bool,
}

/// Sampling capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingCapability {}

/// Client info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mcpmeter".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// MCP initialization result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

/// Server capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Value>,
}

/// Tools capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

/// Server info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn empty_schema() -> Value {
    Value::Object(Default::default())
}

/// A tool as reported by a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input. Advisory only.
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// The single descriptor offered by servers that skipped discovery.
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_TOOL_NAME.to_string(),
            description: Some("Server did not complete MCP discovery".to_string()),
            input_schema: empty_schema(),
        }
    }
}

/// List tools result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Tool call parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// One normalized block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text, including embedded text resources.
    Text { text: String },
    /// Any JSON block this client does not interpret further.
    Structured { value: Value },
    /// Image, audio or blob resource. Only the description is kept.
    Binary {
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentBlock {
    /// Normalize a wire-format content item.
    pub fn from_wire(block: &Value) -> Self {
        let kind = block.get("type").and_then(Value::as_str).unwrap_or("");
        let mime_type = || {
            block
                .get("mimeType")
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        match kind {
            "text" => match block.get("text").and_then(Value::as_str) {
                Some(text) => ContentBlock::Text {
                    text: text.to_string(),
                },
                None => ContentBlock::Structured {
                    value: block.clone(),
                },
            },
            "image" | "audio" => ContentBlock::Binary {
                kind: kind.to_string(),
                mime_type: mime_type(),
            },
            "resource" => {
                let resource = block.get("resource").unwrap_or(&Value::Null);
                if let Some(text) = resource.get("text").and_then(Value::as_str) {
                    ContentBlock::Text {
                        text: text.to_string(),
                    }
                } else if resource.get("blob").is_some() {
                    ContentBlock::Binary {
                        kind: "resource".to_string(),
                        mime_type: resource
                            .get("mimeType")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    }
                } else {
                    ContentBlock::Structured {
                        value: block.clone(),
                    }
                }
            }
            _ => ContentBlock::Structured {
                value: block.clone(),
            },
        }
    }

    /// Text contributed by this block to the flattened representation.
    pub fn flat_text(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Structured { value } => value.to_string(),
            ContentBlock::Binary { .. } => BINARY_PLACEHOLDER.to_string(),
        }
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content blocks in server order.
    pub content: Vec<ContentBlock>,
    /// Whether the tool reported an error.
    #[serde(default)]
    pub is_error: bool,
    /// Produced by a best-effort invocation against a non-compliant server.
    #[serde(default)]
    pub non_standard: bool,
    /// The raw `result` (or error) value as received.
    #[serde(default)]
    pub raw_response: Value,
}

impl ToolCallResult {
    /// Parse a standard `tools/call` result.
    pub fn from_result(result: Value) -> McpResult<Self> {
        let content = match (result.get("content"), result.get("structuredContent")) {
            (Some(Value::Array(items)), _) => items.iter().map(ContentBlock::from_wire).collect(),
            (None, Some(structured)) => vec![ContentBlock::Structured {
                value: structured.clone(),
            }],
            (Some(_), _) => {
                return Err(McpError::protocol_error(
                    "tools/call result field 'content' is not an array",
                ))
            }
            (None, None) => {
                return Err(McpError::protocol_error(
                    "tools/call result is missing 'content'",
                ))
            }
        };

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            content,
            is_error,
            non_standard: false,
            raw_response: result,
        })
    }

    /// Wrap whatever a non-compliant server returned.
    ///
    /// Never fails: the value is kept verbatim and interpreted as far as possible.
    pub fn non_standard(raw: Value) -> Self {
        let content = match &raw {
            Value::Object(object) => match object.get("content") {
                Some(Value::Array(items)) => items.iter().map(ContentBlock::from_wire).collect(),
                _ => Vec::new(),
            },
            Value::String(text) => vec![ContentBlock::Text { text: text.clone() }],
            _ => Vec::new(),
        };

        Self {
            content,
            is_error: false,
            non_standard: true,
            raw_response: raw,
        }
    }

    /// Concatenate all blocks into one text, in server order.
    pub fn flatten(&self) -> String {
        self.content
            .iter()
            .map(ContentBlock::flat_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text submitted for token counting.
    ///
    /// Falls back to the raw response when no content block could be extracted.
    pub fn token_text(&self) -> String {
        if self.content.is_empty() {
            match &self.raw_response {
                Value::Null => String::new(),
                raw => raw.to_string(),
            }
        } else {
            self.flatten()
        }
    }
}

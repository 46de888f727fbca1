//! MCP server definitions.

use crate::error::{McpError, McpResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// How a server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Local child process speaking over stdin/stdout.
    Stdio,
    /// Streamable HTTP endpoint.
    Http,
    /// HTTP+SSE endpoint.
    Sse,
}

impl ServerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::Stdio => "stdio",
            ServerType::Http => "http",
            ServerType::Sse => "sse",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerType {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(ServerType::Stdio),
            "http" => Ok(ServerType::Http),
            "sse" => Ok(ServerType::Sse),
            other => Err(McpError::invalid_config(format!(
                "unknown server type '{other}' (expected stdio, http or sse)"
            ))),
        }
    }
}

fn default_auto_start() -> bool {
    true
}

/// A registered MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name (unique identifier).
    pub name: String,

    /// Transport kind.
    pub server_type: ServerType,

    /// Command to spawn (stdio).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Executable path, used when `command` is absent (stdio).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Arguments for the spawned process.
    #[serde(default)]
    pub args: Vec<String>,

    /// Endpoint URL (http, sse).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Start the server on connect.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Environment overrides for the spawned process.
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Create a stdio server configuration.
    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            server_type: ServerType::Stdio,
            command: Some(command.into()),
            path: None,
            args: args.into_iter().map(Into::into).collect(),
            url: None,
            auto_start: true,
            env_vars: BTreeMap::new(),
        }
    }

    /// Create a streamable HTTP server configuration.
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::remote(name, ServerType::Http, url)
    }

    /// Create an HTTP+SSE server configuration.
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::remote(name, ServerType::Sse, url)
    }

    fn remote(name: impl Into<String>, server_type: ServerType, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_type,
            command: None,
            path: None,
            args: Vec::new(),
            url: Some(url.into()),
            auto_start: true,
            env_vars: BTreeMap::new(),
        }
    }

    /// Add an environment variable for the spawned process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Program to execute for stdio servers: `command`, else `path`.
    pub fn program(&self) -> Option<&str> {
        self.command
            .as_deref()
            .or(self.path.as_deref())
            .filter(|p| !p.trim().is_empty())
    }

    /// Parsed endpoint URL for remote servers.
    pub fn endpoint(&self) -> McpResult<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| McpError::invalid_config(format!("server '{}' has no url", self.name)))?;
        let url = Url::parse(raw)
            .map_err(|e| McpError::invalid_config(format!("invalid url '{raw}': {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(McpError::invalid_config(format!(
                "unsupported url scheme '{scheme}' (expected http or https)"
            ))),
        }
    }

    /// Check that the connection fields match the server type.
    pub fn validate(&self) -> McpResult<()> {
        if self.name.trim().is_empty() {
            return Err(McpError::invalid_config("server name must not be empty"));
        }

        match self.server_type {
            ServerType::Stdio => {
                if self.program().is_none() {
                    return Err(McpError::invalid_config(format!(
                        "stdio server '{}' requires a command or path",
                        self.name
                    )));
                }
                if self.url.is_some() {
                    return Err(McpError::invalid_config(format!(
                        "stdio server '{}' must not define a url",
                        self.name
                    )));
                }
            }
            ServerType::Http | ServerType::Sse => {
                if self.command.is_some() || self.path.is_some() {
                    return Err(McpError::invalid_config(format!(
                        "{} server '{}' must not define a command or path",
                        self.server_type, self.name
                    )));
                }
                self.endpoint()?;
            }
        }

        Ok(())
    }

    /// One-line description of where the server lives.
    pub fn target(&self) -> String {
        match self.server_type {
            ServerType::Stdio => {
                let mut parts = vec![self.program().unwrap_or_default().to_string()];
                parts.extend(self.args.iter().cloned());
                parts.join(" ")
            }
            ServerType::Http | ServerType::Sse => self.url.clone().unwrap_or_default(),
        }
    }
}

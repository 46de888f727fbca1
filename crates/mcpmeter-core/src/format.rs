//! Plain-text rendering of results for the terminal.

use crate::config::Configuration;
use crate::session::{LastCall, SessionState};
use mcpmeter_mcp::{ConnectionMode, ToolCallResult, ToolDescriptor};
use mcpmeter_provider::TokenBreakdown;
use std::fmt::Write;

pub const HELP_TEXT: &str = "\
Available commands:
  list                                   List available tools
  call <tool> [json-args] [--tokens]     Call a tool (--no-tokens skips analysis)
  tokens                                 Analyze tokens of the last call
  set                                    Show current settings
  set <key> <value>                      Change a setting
  help                                   Show this help
  exit | quit                            Leave interactive mode

Settings:
  provider      Token counting provider (anthropic)
  model         Model name or alias
  overhead      Fixed token overhead per call
  auto_tokens   Analyze every call automatically (on/off)";

/// "Available tools (N):" followed by one bullet per tool.
pub fn tool_list(tools: &[ToolDescriptor]) -> String {
    let mut out = format!("Available tools ({}):", tools.len());
    for tool in tools {
        match tool.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                let _ = write!(out, "\n  • {}: {}", tool.name, first_line(description));
            }
            _ => {
                let _ = write!(out, "\n  • {}", tool.name);
            }
        }
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

pub fn connection_banner(server: &str, mode: &ConnectionMode) -> String {
    match mode {
        ConnectionMode::Standard {
            protocol_version,
            server_name,
        } => match server_name {
            Some(name) if name != server => format!(
                "Connected to '{server}' ({name}, protocol {protocol_version})"
            ),
            _ => format!("Connected to '{server}' (protocol {protocol_version})"),
        },
        ConnectionMode::Degraded { reason } => format!(
            "Connected to '{server}' in degraded mode: {reason}\n\
             Tool discovery is unavailable; calls are sent without validation."
        ),
    }
}

/// The response section of a tool call.
pub fn tool_result(result: &ToolCallResult) -> String {
    let body = serde_json::to_string_pretty(&result.raw_response)
        .unwrap_or_else(|_| result.raw_response.to_string());

    let mut out = String::from("--- Tool Response ---");
    if result.non_standard {
        out.push_str("\n(non-standard response)");
    }
    if result.is_error {
        out.push_str("\n(the tool reported an error)");
    }
    out.push('\n');
    out.push_str(&body);
    out
}

pub fn token_breakdown(breakdown: &TokenBreakdown) -> String {
    format!(
        "--- Token Analysis ({} {}) ---\n\
         Input tokens (estimated): {}\n\
         Response tokens (actual): {}\n\
         Total tokens: {}\n\
         Overhead tokens: {}",
        breakdown.provider,
        breakdown.model,
        breakdown.input_tokens,
        breakdown.response_tokens,
        breakdown.total_tokens,
        breakdown.overhead,
    )
}

pub fn analysis_failure(error: &dyn std::fmt::Display) -> String {
    format!("--- Token Analysis ---\nToken analysis failed: {error}")
}

pub fn last_call_header(call: &LastCall) -> String {
    format!(
        "Last call: {} at {}",
        call.tool_name,
        call.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub fn settings(state: &SessionState) -> String {
    let mut out = String::from("Current settings:");
    for (key, value) in state.settings() {
        let _ = write!(out, "\n  {key}: {value}");
    }
    out
}

pub fn server_list(config: &Configuration) -> String {
    if config.servers.is_empty() {
        return "No servers configured. Use 'add-server' to register one.".to_string();
    }

    let mut out = format!("Configured servers ({}):", config.servers.len());
    for (name, server) in &config.servers {
        let marker = if config.default_server.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        let _ = write!(
            out,
            "\n  • {name}{marker}: {} {}",
            server.server_type,
            server.target()
        );
    }
    out
}

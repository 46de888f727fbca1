//! `call-tool`: one call with an optional token analysis.

use super::resolve_server;
use clap::Args;
use mcpmeter_core::{format, run_once, CoreError, OneShotRequest};
use mcpmeter_mcp::{ConnectionMode, McpClient};
use mcpmeter_provider::{default_model, DefaultCounterFactory, ANTHROPIC};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Arguments of `call-tool`.
#[derive(Debug, Args)]
pub struct CallToolArgs {
    /// Tool to invoke
    #[arg(long)]
    pub tool: String,

    /// Tool arguments as a JSON document
    #[arg(long, default_value = "{}")]
    pub args: String,

    /// Server to use instead of the default
    #[arg(long)]
    pub server: Option<String>,

    /// Token counting provider
    #[arg(long, default_value = ANTHROPIC)]
    pub provider: String,

    /// Model name or alias (defaults to ANTHROPIC_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Fixed token overhead (defaults to the configured value)
    #[arg(long)]
    pub overhead: Option<u64>,

    /// Skip token analysis
    #[arg(long)]
    pub no_tokens: bool,
}

pub async fn call_tool(config_path: &Path, args: CallToolArgs) -> anyhow::Result<()> {
    let tool_args: Value = serde_json::from_str(&args.args)
        .map_err(|e| CoreError::validation(format!("invalid JSON in --args: {e}")))?;

    let (store, server) = resolve_server(config_path, args.server.as_deref()).await?;

    let request = OneShotRequest {
        tool: args.tool,
        args: tool_args,
        provider: args.provider,
        model: args.model.unwrap_or_else(default_model),
        overhead: args.overhead.unwrap_or(store.config().token_overhead),
        count_tokens: !args.no_tokens,
    };
    info!(server = %server.name, tool = %request.tool, "Calling tool");

    let client = McpClient::new();
    let counters = DefaultCounterFactory::from_env();
    let report = run_once(&server, request, &client, &counters).await?;

    if let ConnectionMode::Degraded { reason } = &report.mode {
        eprintln!("Warning: '{}' did not complete the MCP handshake ({reason})", report.server);
    }
    println!("{}", format::tool_result(&report.result));

    match report.analysis {
        Some(Ok(breakdown)) => {
            println!();
            println!("{}", format::token_breakdown(&breakdown));
        }
        Some(Err(e)) => return Err(CoreError::from(e).into()),
        None => {}
    }
    Ok(())
}

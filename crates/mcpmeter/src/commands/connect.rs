//! `connect`: handshake and discovery only.

use super::resolve_server;
use mcpmeter_core::{discover, format};
use mcpmeter_mcp::McpClient;
use std::path::Path;

pub async fn connect(config_path: &Path, server: Option<&str>) -> anyhow::Result<()> {
    let (_, server) = resolve_server(config_path, server).await?;

    let client = McpClient::new();
    let discovery = discover(&server, &client).await?;

    println!("{}", format::connection_banner(&discovery.server, &discovery.mode));
    println!("{}", format::tool_list(&discovery.tools));
    Ok(())
}

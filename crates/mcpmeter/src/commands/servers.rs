//! Server registry command handlers.

use clap::Args;
use mcpmeter_core::{format, ConfigStore, CoreError};
use mcpmeter_mcp::{ServerConfig, ServerType};
use std::collections::BTreeMap;
use std::path::Path;

/// Arguments of `add-server`.
#[derive(Debug, Args)]
pub struct AddServerArgs {
    /// Unique server name
    #[arg(long)]
    pub name: String,

    /// Transport: stdio, http or sse
    #[arg(long = "type", value_name = "TYPE")]
    pub server_type: ServerType,

    /// Command to launch a stdio server
    #[arg(long)]
    pub command: Option<String>,

    /// Executable path of a stdio server (used when --command is absent)
    #[arg(long)]
    pub path: Option<String>,

    /// Comma-separated arguments for the stdio command
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Endpoint URL of an http or sse server
    #[arg(long)]
    pub url: Option<String>,

    /// Environment variable for the server process (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Start the server when connecting (default)
    #[arg(long, overrides_with = "no_auto_start")]
    pub auto_start: bool,

    /// Do not start the server when connecting
    #[arg(long, overrides_with = "auto_start")]
    pub no_auto_start: bool,
}

impl AddServerArgs {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            name: self.name,
            server_type: self.server_type,
            command: self.command,
            path: self.path,
            args: self.args,
            url: self.url,
            auto_start: self.auto_start || !self.no_auto_start,
            env_vars: self.env.into_iter().collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_env_var(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{value}'")),
    }
}

/// Register a server.
pub async fn add_server(config_path: &Path, args: AddServerArgs) -> anyhow::Result<()> {
    let mut store = ConfigStore::open(config_path).await?;
    let server = args.into_config();
    let name = server.name.clone();
    let replaced = store.server(&name).is_some();

    store.add_server(server).await?;

    if replaced {
        println!("✓ Updated server '{name}'");
    } else {
        println!("✓ Added server '{name}'");
    }
    if store.config().default_server.as_deref() == Some(name.as_str()) {
        println!("  '{name}' is the default server");
    }
    Ok(())
}

/// Print the registered servers.
pub async fn list_servers(config_path: &Path) -> anyhow::Result<()> {
    let store = ConfigStore::open(config_path).await?;
    println!("{}", format::server_list(store.config()));
    Ok(())
}

pub async fn remove_server(config_path: &Path, name: &str) -> anyhow::Result<()> {
    let mut store = ConfigStore::open(config_path).await?;
    store.remove_server(name).await?;
    println!("✓ Removed server '{name}'");
    Ok(())
}

pub async fn set_default(config_path: &Path, name: &str) -> anyhow::Result<()> {
    let mut store = ConfigStore::open(config_path).await?;
    store.set_default(name).await?;
    println!("✓ Default server set to '{name}'");
    Ok(())
}

/// Load the store and pick a server, failing before any network activity.
pub async fn resolve_server(
    config_path: &Path,
    name: Option<&str>,
) -> Result<(ConfigStore, ServerConfig), CoreError> {
    let store = ConfigStore::open(config_path).await?;
    let server = store.resolve(name)?.clone();
    Ok((store, server))
}

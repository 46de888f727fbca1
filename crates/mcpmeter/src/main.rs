//! mcpmeter - measure the token cost of MCP tool calls.
//!
//! This is the main entry point for the mcpmeter CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use mcpmeter_core::{CoreError, ErrorCategory, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use mcpmeter_mcp::McpError;
use mcpmeter_provider::ProviderError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "mcpmeter")]
#[command(author, version, about = "Measure the token cost of MCP tool calls", long_about = None)]
struct Cli {
    /// Path of the server configuration file
    #[arg(long, global = true, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an MCP server
    AddServer(AddServerArgs),
    /// List registered servers
    ListServers,
    /// Remove a registered server
    RemoveServer {
        /// Server name
        name: String,
    },
    /// Make a server the default
    SetDefault {
        /// Server name
        name: String,
    },
    /// Connect to a server and list its tools
    Connect {
        /// Server to use instead of the default
        #[arg(long)]
        server: Option<String>,
    },
    /// Call a tool and report its token cost
    CallTool(CallToolArgs),
    /// Start an interactive session
    Interactive {
        /// Server to use instead of the default
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ErrorCategory::Validation.exit_code()
            } else {
                0
            };
            let _ = e.print();
            return exit_code(code);
        }
    };

    let log_file = init_logging(cli.verbose);
    if let Some(path) = &log_file {
        debug!(path = %path.display(), "Logging to file");
    }
    if let Ok(path) = &dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            exit_code(category_of(&e).exit_code())
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;
    match cli.command {
        Commands::AddServer(args) => add_server(&config, args).await,
        Commands::ListServers => list_servers(&config).await,
        Commands::RemoveServer { name } => remove_server(&config, &name).await,
        Commands::SetDefault { name } => set_default(&config, &name).await,
        Commands::Connect { server } => connect(&config, server.as_deref()).await,
        Commands::CallTool(args) => call_tool(&config, args).await,
        Commands::Interactive { server } => run_interactive(&config, server.as_deref()).await,
    }
}

/// Find the most specific known error in the chain.
fn category_of(error: &anyhow::Error) -> ErrorCategory {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<CoreError>() {
            return e.category();
        }
        if let Some(e) = cause.downcast_ref::<McpError>() {
            return ErrorCategory::of_mcp(e);
        }
        if cause.downcast_ref::<ProviderError>().is_some() {
            return ErrorCategory::Provider;
        }
    }
    ErrorCategory::Internal
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mcpmeter_core::ConfigError;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_category_of_wrapped_errors() {
        let err = anyhow::Error::from(CoreError::from(ConfigError::NoServerSelected));
        assert_eq!(category_of(&err), ErrorCategory::Configuration);

        let err = anyhow::Error::from(McpError::Timeout).context("calling tool");
        assert_eq!(category_of(&err), ErrorCategory::Connection);

        let err = anyhow::Error::from(ProviderError::unsupported("openai"));
        assert_eq!(category_of(&err), ErrorCategory::Provider);

        let err = anyhow::anyhow!("something else");
        assert_eq!(category_of(&err), ErrorCategory::Internal);
    }

    #[test]
    fn test_parse_add_server() {
        let cli = Cli::try_parse_from([
            "mcpmeter",
            "add-server",
            "--name",
            "fs",
            "--type",
            "stdio",
            "--command",
            "npx",
            "--args",
            "-y,@modelcontextprotocol/server-filesystem,/tmp",
            "--env",
            "DEBUG=1",
            "--no-auto-start",
        ])
        .unwrap();

        match cli.command {
            Commands::AddServer(args) => {
                assert_eq!(args.args.len(), 3);
                assert_eq!(args.env, vec![("DEBUG".to_string(), "1".to_string())]);
                assert!(args.no_auto_start);
            }
            _ => panic!("expected add-server"),
        }
    }

    #[test]
    fn test_parse_call_tool_defaults() {
        let cli = Cli::try_parse_from(["mcpmeter", "call-tool", "--tool", "search"]).unwrap();
        match cli.command {
            Commands::CallTool(args) => {
                assert_eq!(args.args, "{}");
                assert_eq!(args.provider, "anthropic");
                assert!(args.model.is_none());
                assert!(!args.no_tokens);
            }
            _ => panic!("expected call-tool"),
        }
    }
}

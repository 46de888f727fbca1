//! Interactive command loop.

use super::resolve_server;
use mcpmeter_core::{Session, SessionPhase, SessionState};
use mcpmeter_mcp::McpClient;
use mcpmeter_provider::DefaultCounterFactory;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const PROMPT: &str = "mcp> ";

pub async fn run_interactive(config_path: &Path, server: Option<&str>) -> anyhow::Result<()> {
    let (store, server) = resolve_server(config_path, server).await?;

    let state = SessionState::new(server.name.clone()).with_overhead(store.config().token_overhead);
    let mut session = Session::new(
        server,
        state,
        Arc::new(McpClient::new()),
        Arc::new(DefaultCounterFactory::from_env()),
    );

    let banner = session.connect().await?;
    println!("{}", banner.text);
    println!("Type 'help' for available commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{PROMPT}");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            debug!("End of input");
            println!();
            session.close().await;
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match session.execute(&line).await {
            Ok(output) => {
                println!("{}", output.text);
                if output.exit {
                    return Ok(());
                }
            }
            Err(e) if session.phase() == SessionPhase::Closed => return Err(e.into()),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

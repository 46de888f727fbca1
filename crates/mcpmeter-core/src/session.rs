//! Session controller.
//!
//! A [`Session`] drives one connection through the interactive command set.
//! [`run_once`] and [`discover`] cover the one-shot commands with the same
//! building blocks.

use crate::error::{CoreError, CoreResult};
use crate::format;
use chrono::{DateTime, Utc};
use mcpmeter_mcp::{
    ConnectionMode, Connector, McpConnection, ServerConfig, ToolCallResult, ToolDescriptor,
};
use mcpmeter_provider::{
    analyze_tool_call, default_model, is_supported_provider, ProviderResult, TokenBreakdown,
    TokenCounterFactory, ANTHROPIC, DEFAULT_OVERHEAD,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CALL_USAGE: &str = "usage: call <tool> [json-args] [--tokens|--no-tokens]";
const SET_USAGE: &str = "usage: set [<key> <value>]";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connected,
    Closed,
}

/// The most recent successful tool call.
#[derive(Debug, Clone)]
pub struct LastCall {
    pub tool_name: String,
    pub args: Value,
    pub result: ToolCallResult,
    pub timestamp: DateTime<Utc>,
}

/// Settings and history local to one interactive session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub active_server: String,
    pub provider: String,
    pub model: String,
    pub overhead: u64,
    pub auto_tokens: bool,
    pub last_call: Option<LastCall>,
}

impl SessionState {
    pub fn new(active_server: impl Into<String>) -> Self {
        Self {
            active_server: active_server.into(),
            provider: ANTHROPIC.to_string(),
            model: default_model(),
            overhead: DEFAULT_OVERHEAD,
            auto_tokens: false,
            last_call: None,
        }
    }

    pub fn with_overhead(mut self, overhead: u64) -> Self {
        self.overhead = overhead;
        self
    }

    /// Update one setting. The state is unchanged when the value is rejected.
    pub fn set(&mut self, key: &str, value: &str) -> CoreResult<()> {
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "provider" => {
                if !is_supported_provider(value) {
                    return Err(CoreError::validation(format!(
                        "unsupported provider '{value}'"
                    )));
                }
                self.provider = value.to_ascii_lowercase();
            }
            "model" => {
                if value.is_empty() {
                    return Err(CoreError::validation("model must not be empty"));
                }
                self.model = value.to_string();
            }
            "overhead" => {
                self.overhead = value.parse().map_err(|_| {
                    CoreError::validation("invalid value for overhead: must be a non-negative integer")
                })?;
            }
            "auto_tokens" => {
                self.auto_tokens = parse_switch(value).ok_or_else(|| {
                    CoreError::validation("invalid value for auto_tokens: use on or off")
                })?;
            }
            other => {
                return Err(CoreError::validation(format!(
                    "unknown setting '{other}' (expected provider, model, overhead or auto_tokens)"
                )))
            }
        }
        Ok(())
    }

    /// Settings in display order.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("server", self.active_server.clone()),
            ("provider", self.provider.clone()),
            ("model", self.model.clone()),
            ("overhead", self.overhead.to_string()),
            (
                "auto_tokens",
                if self.auto_tokens { "on" } else { "off" }.to_string(),
            ),
        ]
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    List,
    Call {
        tool: String,
        args: Value,
        /// Per-call override of `auto_tokens`.
        tokens: Option<bool>,
    },
    Tokens,
    Set(Option<(String, String)>),
    Help,
    Exit,
}

impl SessionCommand {
    pub fn parse(line: &str) -> CoreResult<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "call" => parse_call(rest),
            "tokens" => Ok(Self::Tokens),
            "set" if rest.is_empty() => Ok(Self::Set(None)),
            "set" => match rest.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => Ok(Self::Set(Some((
                    key.to_string(),
                    value.trim().to_string(),
                )))),
                _ => Err(CoreError::validation(SET_USAGE)),
            },
            "help" | "?" => Ok(Self::Help),
            "exit" | "quit" => Ok(Self::Exit),
            "" => Err(CoreError::validation("empty command")),
            other => Err(CoreError::validation(format!(
                "unknown command '{other}'; type 'help' for a list of commands"
            ))),
        }
    }
}

fn parse_call(rest: &str) -> CoreResult<SessionCommand> {
    let mut rest = rest.trim_end();
    let mut tokens: Option<bool> = None;

    loop {
        let (flag, stripped) = if let Some(s) = strip_flag(rest, "--no-tokens") {
            (false, s)
        } else if let Some(s) = strip_flag(rest, "--tokens") {
            (true, s)
        } else {
            break;
        };

        if tokens.is_some_and(|t| t != flag) {
            return Err(CoreError::validation(
                "--tokens and --no-tokens cannot be combined",
            ));
        }
        tokens = Some(flag);
        rest = stripped.trim_end();
    }

    let (tool, args) = match rest.split_once(char::is_whitespace) {
        Some((tool, args)) => (tool, args.trim()),
        None => (rest, ""),
    };
    if tool.is_empty() || tool.starts_with("--") {
        return Err(CoreError::validation(CALL_USAGE));
    }

    let args = if args.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(args)
            .map_err(|e| CoreError::validation(format!("invalid JSON arguments: {e}")))?
    };

    Ok(SessionCommand::Call {
        tool: tool.to_string(),
        args,
        tokens,
    })
}

/// Strip a trailing flag that stands as its own word.
fn strip_flag<'a>(text: &'a str, flag: &str) -> Option<&'a str> {
    let stripped = text.strip_suffix(flag)?;
    (stripped.is_empty() || stripped.ends_with(char::is_whitespace)).then_some(stripped)
}

/// Text produced by one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    /// The session ended.
    pub exit: bool,
}

impl CommandOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit: false,
        }
    }

    pub fn exit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit: true,
        }
    }
}

/// An interactive session against one server.
pub struct Session {
    server: ServerConfig,
    phase: SessionPhase,
    connection: Option<McpConnection>,
    state: SessionState,
    connector: Arc<dyn Connector>,
    counters: Arc<dyn TokenCounterFactory>,
}

impl Session {
    pub fn new(
        server: ServerConfig,
        state: SessionState,
        connector: Arc<dyn Connector>,
        counters: Arc<dyn TokenCounterFactory>,
    ) -> Self {
        Self {
            server,
            phase: SessionPhase::Disconnected,
            connection: None,
            state,
            connector,
            counters,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> Option<&ConnectionMode> {
        self.connection.as_ref().map(McpConnection::mode)
    }

    /// Connect and run one discovery.
    ///
    /// On failure the session stays disconnected.
    pub async fn connect(&mut self) -> CoreResult<CommandOutput> {
        if self.phase != SessionPhase::Disconnected {
            return Err(CoreError::InvalidState(format!(
                "cannot connect from {:?}",
                self.phase
            )));
        }

        let mut connection = self.connector.connect(&self.server).await?;
        let tools = match connection.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(close_err) = connection.disconnect().await {
                    debug!(error = %close_err, "Error disconnecting after failed discovery");
                }
                return Err(e.into());
            }
        };

        let banner = format::connection_banner(&self.server.name, connection.mode());
        self.connection = Some(connection);
        self.phase = SessionPhase::Connected;
        info!(server = %self.server.name, "Session connected");

        Ok(CommandOutput::text(format!(
            "{banner}\n{}",
            format::tool_list(&tools)
        )))
    }

    /// Parse and run one line of input.
    ///
    /// Fatal connection errors close the session before they are returned.
    pub async fn execute(&mut self, line: &str) -> CoreResult<CommandOutput> {
        if self.phase != SessionPhase::Connected {
            return Err(CoreError::InvalidState(format!(
                "no commands are accepted while {:?}",
                self.phase
            )));
        }

        let command = SessionCommand::parse(line)?;
        debug!(command = ?command, "Executing session command");

        match self.run(command).await {
            Err(e) if e.is_fatal() => {
                warn!(error = %e, "Connection lost, closing session");
                self.teardown().await;
                Err(e)
            }
            outcome => outcome,
        }
    }

    async fn run(&mut self, command: SessionCommand) -> CoreResult<CommandOutput> {
        match command {
            SessionCommand::List => {
                let tools = self.list_tools().await?;
                Ok(CommandOutput::text(format::tool_list(&tools)))
            }
            SessionCommand::Call { tool, args, tokens } => {
                let result = self.call_tool(&tool, args).await?;
                let mut text = format::tool_result(&result);

                if tokens.unwrap_or(self.state.auto_tokens) {
                    text.push_str("\n\n");
                    match self.analyze_last().await {
                        Ok(breakdown) => text.push_str(&format::token_breakdown(&breakdown)),
                        Err(e) => {
                            warn!(error = %e, "Token analysis failed");
                            text.push_str(&format::analysis_failure(&e));
                        }
                    }
                }
                Ok(CommandOutput::text(text))
            }
            SessionCommand::Tokens => {
                let breakdown = self.analyze_last().await?;
                let header = self
                    .state
                    .last_call
                    .as_ref()
                    .map(format::last_call_header)
                    .unwrap_or_default();
                Ok(CommandOutput::text(format!(
                    "{header}\n{}",
                    format::token_breakdown(&breakdown)
                )))
            }
            SessionCommand::Set(None) => Ok(CommandOutput::text(format::settings(&self.state))),
            SessionCommand::Set(Some((key, value))) => {
                self.state.set(&key, &value)?;
                Ok(CommandOutput::text(format!("Set {key} = {value}")))
            }
            SessionCommand::Help => Ok(CommandOutput::text(format::HELP_TEXT)),
            SessionCommand::Exit => {
                self.close().await;
                Ok(CommandOutput::exit("Goodbye"))
            }
        }
    }

    fn connection_mut(&mut self) -> CoreResult<&mut McpConnection> {
        self.connection
            .as_mut()
            .ok_or_else(|| CoreError::InvalidState("not connected".to_string()))
    }

    /// Re-run discovery.
    async fn list_tools(&mut self) -> CoreResult<Vec<ToolDescriptor>> {
        Ok(self.connection_mut()?.list_tools().await?)
    }

    /// Invoke a tool and remember the call for later analysis.
    async fn call_tool(&mut self, tool: &str, args: Value) -> CoreResult<ToolCallResult> {
        let result = self
            .connection_mut()?
            .call_tool(tool, args.clone())
            .await?;

        self.state.last_call = Some(LastCall {
            tool_name: tool.to_string(),
            args,
            result: result.clone(),
            timestamp: Utc::now(),
        });
        Ok(result)
    }

    /// Token breakdown of the last call with the current settings.
    async fn analyze_last(&self) -> CoreResult<TokenBreakdown> {
        let last = self
            .state
            .last_call
            .as_ref()
            .ok_or(CoreError::NoPreviousCall)?;

        let counter = self.counters.create(&self.state.provider)?;
        let breakdown = analyze_tool_call(
            counter.as_ref(),
            &self.state.model,
            self.state.overhead,
            &last.tool_name,
            &last.args,
            &last.result.token_text(),
        )
        .await?;
        Ok(breakdown)
    }

    /// Disconnect and end the session.
    pub async fn close(&mut self) {
        if self.phase != SessionPhase::Closed {
            self.teardown().await;
        }
    }

    async fn teardown(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.disconnect().await {
                debug!(error = %e, "Error disconnecting session");
            }
        }
        self.phase = SessionPhase::Closed;
        info!(server = %self.server.name, "Session closed");
    }
}

/// Outcome of a discovery-only connection.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub server: String,
    pub mode: ConnectionMode,
    pub tools: Vec<ToolDescriptor>,
}

/// Connect, list the tools, disconnect.
pub async fn discover(server: &ServerConfig, connector: &dyn Connector) -> CoreResult<Discovery> {
    let mut connection = connector.connect(server).await?;
    let tools = connection.list_tools().await;
    let mode = connection.mode().clone();

    if let Err(e) = connection.disconnect().await {
        debug!(error = %e, "Error disconnecting after discovery");
    }

    Ok(Discovery {
        server: server.name.clone(),
        mode,
        tools: tools?,
    })
}

/// Parameters of a single tool call.
#[derive(Debug, Clone)]
pub struct OneShotRequest {
    pub tool: String,
    pub args: Value,
    pub provider: String,
    pub model: String,
    pub overhead: u64,
    pub count_tokens: bool,
}

/// Result of [`run_once`].
#[derive(Debug)]
pub struct OneShotReport {
    pub server: String,
    pub mode: ConnectionMode,
    pub result: ToolCallResult,
    /// `None` when counting was not requested. A failed analysis does not
    /// discard the tool result.
    pub analysis: Option<ProviderResult<TokenBreakdown>>,
}

/// Connect, discover, call one tool, optionally count tokens, disconnect.
///
/// The token counter is selected before connecting so an unsupported
/// provider fails without touching the server.
pub async fn run_once(
    server: &ServerConfig,
    request: OneShotRequest,
    connector: &dyn Connector,
    counters: &dyn TokenCounterFactory,
) -> CoreResult<OneShotReport> {
    let counter = if request.count_tokens {
        Some(counters.create(&request.provider)?)
    } else {
        None
    };

    let mut connection = connector.connect(server).await?;
    let outcome = match connection.list_tools().await {
        Ok(_) => connection.call_tool(&request.tool, request.args.clone()).await,
        Err(e) => Err(e),
    };
    let mode = connection.mode().clone();

    if let Err(e) = connection.disconnect().await {
        debug!(error = %e, "Error disconnecting after call");
    }
    let result = outcome?;

    let analysis = match counter {
        Some(counter) => Some(
            analyze_tool_call(
                counter.as_ref(),
                &request.model,
                request.overhead,
                &request.tool,
                &request.args,
                &result.token_text(),
            )
            .await,
        ),
        None => None,
    };

    Ok(OneShotReport {
        server: server.name.clone(),
        mode,
        result,
        analysis,
    })
}

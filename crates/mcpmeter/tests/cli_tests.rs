//! CLI integration tests.
//!
//! These tests exercise the CLI commands end-to-end.

use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Minimal MCP server on stdin/stdout answering initialize, tools/list and tools/call.
const SH_PEER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"sh-peer","version":"0.1"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"greet","description":"Say hello","inputSchema":{"type":"object"}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}]}}\n' "$id" "$GREETING" ;;
  esac
done
"#;

/// Get the path to the mcpmeter binary.
fn binary_path() -> &'static str {
    env!("CARGO_BIN_EXE_mcpmeter")
}

/// Run the binary inside `dir` with its own config file and no credentials.
fn mcpmeter(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(binary_path());
    cmd.current_dir(dir)
        .arg("--config")
        .arg(dir.join("mcp_config.json"))
        .args(args)
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("MCPMETER_CONFIG")
        .env_remove("RUST_LOG")
        .env("HOME", dir)
        .env("XDG_STATE_HOME", dir.join("state"));
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    mcpmeter(dir, args)
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_config(dir: &Path, document: Value) {
    std::fs::write(
        dir.join("mcp_config.json"),
        serde_json::to_string_pretty(&document).unwrap(),
    )
    .unwrap();
}

fn sh_peer_config(dir: &Path) {
    write_config(
        dir,
        json!({
            "servers": {
                "sh": {
                    "name": "sh",
                    "server_type": "stdio",
                    "command": "sh",
                    "args": ["-c", SH_PEER],
                    "env_vars": {"GREETING": "hello from sh"}
                }
            },
            "default_server": "sh",
            "token_overhead": 100
        }),
    );
}

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["--help"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Measure the token cost of MCP tool calls"));
    for command in ["add-server", "list-servers", "call-tool", "interactive"] {
        assert!(out.contains(command), "missing {command}");
    }
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["call-tool", "--bogus"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_add_list_remove_servers() {
    let dir = TempDir::new().unwrap();

    let output = run(
        dir.path(),
        &[
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
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Added server 'fs'"));

    let output = run(
        dir.path(),
        &["add-server", "--name", "web", "--type", "sse", "--url", "https://example.com/sse"],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("mcp_config.json")).unwrap())
            .unwrap();
    assert_eq!(saved["default_server"], "fs");
    assert_eq!(saved["servers"]["fs"]["args"][0], "-y");
    assert_eq!(saved["servers"]["fs"]["env_vars"]["DEBUG"], "1");
    assert_eq!(saved["servers"]["web"]["server_type"], "sse");

    let output = run(dir.path(), &["list-servers"]);
    let out = stdout(&output);
    assert!(out.contains("Configured servers (2):"));
    assert!(out.contains("fs (default)"));

    let output = run(dir.path(), &["set-default", "web"]);
    assert!(output.status.success());

    let output = run(dir.path(), &["remove-server", "web"]);
    assert!(output.status.success());
    let output = run(dir.path(), &["list-servers"]);
    let out = stdout(&output);
    assert!(out.contains("Configured servers (1):"));
    assert!(!out.contains("(default)"));
}

#[test]
fn test_invalid_server_definition() {
    let dir = TempDir::new().unwrap();
    let output = run(
        dir.path(),
        &["add-server", "--name", "bad", "--type", "http", "--url", "not a url"],
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join("mcp_config.json").exists());

    let output = run(dir.path(), &["add-server", "--name", "x", "--type", "carrier-pigeon"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_remove_unknown_server() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["remove-server", "ghost"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("ghost"));
}

#[test]
fn test_call_without_servers() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["call-tool", "--tool", "x", "--no-tokens"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_call_with_invalid_json_args() {
    let dir = TempDir::new().unwrap();
    write_config(
        dir.path(),
        json!({"servers": {"api": {"name": "api", "server_type": "http", "url": "http://127.0.0.1:9/mcp"}}}),
    );
    let output = run(
        dir.path(),
        &["call-tool", "--server", "api", "--tool", "x", "--args", "{oops"],
    );
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_unsupported_provider() {
    let dir = TempDir::new().unwrap();
    write_config(
        dir.path(),
        json!({"servers": {"api": {"name": "api", "server_type": "http", "url": "http://127.0.0.1:9/mcp"}}}),
    );
    let output = run(
        dir.path(),
        &["call-tool", "--server", "api", "--tool", "x", "--provider", "openai"],
    );
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_connection_refused() {
    let dir = TempDir::new().unwrap();
    write_config(
        dir.path(),
        json!({
            "servers": {"api": {"name": "api", "server_type": "http", "url": "http://127.0.0.1:9/mcp"}},
            "default_server": "api"
        }),
    );
    let output = run(dir.path(), &["connect"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("mcp_config.json"), "{ nope").unwrap();

    let output = run(dir.path(), &["list-servers"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("mcp_config.json")).unwrap(),
        "{ nope"
    );
}

#[cfg(unix)]
#[test]
fn test_connect_stdio_server() {
    let dir = TempDir::new().unwrap();
    sh_peer_config(dir.path());

    let output = run(dir.path(), &["connect"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Connected to 'sh'"));
    assert!(out.contains("Available tools (1):"));
    assert!(out.contains("• greet: Say hello"));
}

#[cfg(unix)]
#[test]
fn test_call_tool_without_tokens() {
    let dir = TempDir::new().unwrap();
    sh_peer_config(dir.path());

    let output = run(dir.path(), &["call-tool", "--tool", "greet", "--no-tokens"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("--- Tool Response ---"));
    assert!(out.contains("hello from sh"));
    assert!(!out.contains("Token Analysis"));
}

#[cfg(unix)]
#[test]
fn test_call_tool_missing_api_key_keeps_result() {
    let dir = TempDir::new().unwrap();
    sh_peer_config(dir.path());

    let output = run(dir.path(), &["call-tool", "--tool", "greet"]);
    assert_eq!(output.status.code(), Some(5));
    assert!(stdout(&output).contains("hello from sh"));
    assert!(stderr(&output).contains("Missing API key"));
}

#[cfg(unix)]
#[test]
fn test_interactive_session() {
    use std::io::Write;
    use std::process::Stdio;

    let dir = TempDir::new().unwrap();
    sh_peer_config(dir.path());

    let mut child = mcpmeter(dir.path(), &["interactive"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn interactive session");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"tokens\nset overhead abc\nset overhead 7\ncall greet --no-tokens\nset\nexit\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Available tools (1):"));
    assert!(out.contains("hello from sh"));
    assert!(out.contains("overhead: 7"));
    assert!(out.contains("Goodbye"));

    let err = stderr(&output);
    assert!(err.contains("no previous tool call"));
    assert!(err.contains("invalid value for overhead"));
}

//! Session controller behavior against scripted peers.

use mcpmeter_core::{
    discover, run_once, CoreError, OneShotRequest, Session, SessionPhase, SessionState,
};
use mcpmeter_mcp::{ConnectOptions, ConnectionMode, McpError, ServerConfig};
use mcpmeter_provider::ProviderError;
use mcpmeter_test_utils::{
    FixedCounterFactory, FixedTokenCounter, MockConnector, MockReply, MockTransport,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn server() -> ServerConfig {
    ServerConfig::http("mock", "http://localhost:9/mcp")
}

fn session_with(transport: &MockTransport, counter: FixedTokenCounter) -> Session {
    Session::new(
        server(),
        SessionState::new("mock").with_overhead(100),
        Arc::new(MockConnector::new(transport.clone())),
        Arc::new(FixedCounterFactory::new(counter)),
    )
}

async fn connected(transport: &MockTransport) -> Session {
    let mut session = session_with(transport, FixedTokenCounter::new(12, 340));
    session.connect().await.unwrap();
    session
}

#[tokio::test]
async fn test_connect_discovers_tools() {
    let transport = MockTransport::compliant(&["search", "fetch"]);
    let mut session = session_with(&transport, FixedTokenCounter::new(1, 1));

    let output = session.connect().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Connected);
    assert!(output.text.contains("Available tools (2):"));
    assert!(output.text.contains("• search: Mock tool search"));
    assert_eq!(transport.notifications(), vec!["notifications/initialized"]);
    assert_eq!(transport.request_count("tools/list"), 1);

    assert!(matches!(
        session.connect().await,
        Err(CoreError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_nothing_but_connect_while_disconnected() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = session_with(&transport, FixedTokenCounter::new(1, 1));

    let err = session.execute("list").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_refused_connection_stays_disconnected() {
    let mut session = Session::new(
        server(),
        SessionState::new("mock"),
        Arc::new(MockConnector::refusing()),
        Arc::new(FixedCounterFactory::new(FixedTokenCounter::new(1, 1))),
    );

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::Mcp(McpError::ConnectionFailed(_))));
    assert_eq!(session.phase(), SessionPhase::Disconnected);
}

#[tokio::test]
async fn test_tokens_before_any_call() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = connected(&transport).await;

    let err = session.execute("tokens").await.unwrap_err();
    assert!(matches!(err, CoreError::NoPreviousCall));
    assert_eq!(session.phase(), SessionPhase::Connected);
}

#[tokio::test]
async fn test_set_rejects_bad_overhead_without_contacting_server() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = connected(&transport).await;
    let before = transport.requests().len();

    let err = session.execute("set overhead abc").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(session.state().overhead, 100);
    assert_eq!(transport.requests().len(), before);

    session.execute("set overhead 20").await.unwrap();
    assert_eq!(session.state().overhead, 20);

    let output = session.execute("set").await.unwrap();
    assert!(output.text.contains("overhead: 20"));
}

#[tokio::test]
async fn test_unknown_tool_is_not_sent() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = connected(&transport).await;

    let err = session.execute("call missing {}").await.unwrap_err();
    assert!(matches!(err, CoreError::Mcp(McpError::ToolNotFound(ref name)) if name == "missing"));
    assert_eq!(transport.request_count("tools/call"), 0);
    assert_eq!(session.phase(), SessionPhase::Connected);
    assert!(session.state().last_call.is_none());
}

#[tokio::test]
async fn test_call_with_tokens_reports_breakdown() {
    let transport = MockTransport::compliant(&["search"]).with_tool_result(json!({
        "content": [
            {"type": "text", "text": "first"},
            {"type": "image", "data": "aGVsbG8=", "mimeType": "image/png"}
        ]
    }));
    let counter = FixedTokenCounter::new(12, 340);
    let factory = Arc::new(FixedCounterFactory::new(counter));
    let mut session = Session::new(
        server(),
        SessionState::new("mock").with_overhead(100),
        Arc::new(MockConnector::new(transport.clone())),
        factory.clone(),
    );
    session.connect().await.unwrap();

    let output = session
        .execute(r#"call search {"query": "rust"} --tokens"#)
        .await
        .unwrap();
    assert!(output.text.starts_with("--- Tool Response ---"));
    assert!(output.text.contains("Input tokens (estimated): 12"));
    assert!(output.text.contains("Response tokens (actual): 340"));
    assert!(output.text.contains("Total tokens: 452"));

    let seen = factory.counter().seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].1, "Tool: search\nArguments: {\n  \"query\": \"rust\"\n}");
    assert_eq!(seen[1].1, "first\n[binary content omitted]");

    let last = session.state().last_call.as_ref().unwrap();
    assert_eq!(last.tool_name, "search");
    assert_eq!(last.args, json!({"query": "rust"}));

    let output = session.execute("tokens").await.unwrap();
    assert!(output.text.starts_with("Last call: search at "));
    assert!(output.text.contains("Total tokens: 452"));
    assert_eq!(transport.request_count("tools/call"), 1);
}

#[tokio::test]
async fn test_auto_tokens_and_per_call_override() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = connected(&transport).await;

    let output = session.execute("call search").await.unwrap();
    assert!(!output.text.contains("Token Analysis"));

    session.execute("set auto_tokens on").await.unwrap();
    let output = session.execute("call search").await.unwrap();
    assert!(output.text.contains("Total tokens: 452"));

    let output = session.execute("call search --no-tokens").await.unwrap();
    assert!(!output.text.contains("Token Analysis"));
}

#[tokio::test]
async fn test_analysis_failure_keeps_result() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = session_with(&transport, FixedTokenCounter::without_key());
    session.connect().await.unwrap();

    let output = session.execute("call search --tokens").await.unwrap();
    assert!(output.text.contains("--- Tool Response ---"));
    assert!(output.text.contains("Token analysis failed"));
    assert!(session.state().last_call.is_some());

    let err = session.execute("tokens").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Provider(ProviderError::MissingApiKey(_))
    ));
    assert_eq!(session.phase(), SessionPhase::Connected);
}

#[tokio::test]
async fn test_tool_error_keeps_session_open() {
    let transport = MockTransport::compliant(&["search"])
        .with_reply("tools/call", MockReply::rpc_error(-32602, "Invalid params"));
    let mut session = connected(&transport).await;

    let err = session.execute("call search").await.unwrap_err();
    assert!(matches!(err, CoreError::Mcp(McpError::ToolError(_))));
    assert!(!err.is_fatal());
    assert_eq!(session.phase(), SessionPhase::Connected);
}

#[tokio::test]
async fn test_degraded_server_still_usable() {
    let transport = MockTransport::new()
        .with_reply("tools/call", MockReply::Result(json!({"answer": 42})));
    let mut session = session_with(&transport, FixedTokenCounter::new(5, 7));

    let output = session.connect().await.unwrap();
    assert!(output.text.contains("degraded mode"));
    assert!(output.text.contains("• unknown"));
    assert!(matches!(session.mode(), Some(ConnectionMode::Degraded { .. })));
    assert!(transport.notifications().is_empty());
    assert_eq!(transport.request_count("tools/list"), 0);

    let output = session.execute("call anything --tokens").await.unwrap();
    assert!(output.text.contains("(non-standard response)"));
    assert!(output.text.contains("\"answer\": 42"));
    assert!(output.text.contains("Total tokens: 112"));

    let last = session.state().last_call.as_ref().unwrap();
    assert!(last.result.non_standard);
    assert!(!last.result.is_error);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_closes_session() {
    let transport = MockTransport::compliant(&["slow"]).with_reply("tools/call", MockReply::Silent);
    let connector = MockConnector::new(transport.clone()).with_options(ConnectOptions {
        handshake_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(5),
    });
    let mut session = Session::new(
        server(),
        SessionState::new("mock"),
        Arc::new(connector),
        Arc::new(FixedCounterFactory::new(FixedTokenCounter::new(1, 1))),
    );
    session.connect().await.unwrap();

    let err = session.execute("call slow").await.unwrap_err();
    assert!(matches!(err, CoreError::Mcp(McpError::Timeout)));
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert_eq!(transport.close_count(), 1);

    assert!(matches!(
        session.execute("list").await,
        Err(CoreError::InvalidState(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_closes_session_when_shutdown_hangs() {
    let transport = MockTransport::compliant(&["slow"])
        .with_reply("tools/call", MockReply::Silent)
        .with_hanging_close();
    let connector = MockConnector::new(transport.clone()).with_options(ConnectOptions {
        handshake_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(5),
    });
    let mut session = Session::new(
        server(),
        SessionState::new("mock"),
        Arc::new(connector),
        Arc::new(FixedCounterFactory::new(FixedTokenCounter::new(1, 1))),
    );
    session.connect().await.unwrap();

    let err = session.execute("call slow").await.unwrap_err();
    assert!(matches!(err, CoreError::Mcp(McpError::Timeout)));
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn test_rejected_discovery_keeps_connection() {
    let transport = MockTransport::compliant(&["search"])
        .with_reply("tools/list", MockReply::rpc_error(-32601, "Method not found"))
        .with_tool_result(json!({"answer": 42}));
    let mut session = session_with(&transport, FixedTokenCounter::new(5, 7));

    let output = session.connect().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Connected);
    assert!(output.text.contains("degraded mode"));
    assert!(output.text.contains("• unknown"));
    assert!(matches!(session.mode(), Some(ConnectionMode::Degraded { .. })));
    assert_eq!(transport.close_count(), 0);

    let output = session.execute("call anything --tokens").await.unwrap();
    assert!(output.text.contains("(non-standard response)"));
    assert!(output.text.contains("Total tokens: 112"));
    assert_eq!(transport.request_count("tools/call"), 1);
}

#[tokio::test]
async fn test_closed_session_never_counts_tokens() {
    let transport = MockTransport::compliant(&["search"]);
    let factory = Arc::new(FixedCounterFactory::new(FixedTokenCounter::new(12, 340)));
    let mut session = Session::new(
        server(),
        SessionState::new("mock"),
        Arc::new(MockConnector::new(transport.clone())),
        factory.clone(),
    );
    session.connect().await.unwrap();
    session.execute("call search").await.unwrap();
    session.execute("exit").await.unwrap();

    let err = session.execute("tokens").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn test_peer_exit_closes_session() {
    let transport =
        MockTransport::compliant(&["crash"]).with_reply("tools/call", MockReply::Disconnect);
    let mut session = connected(&transport).await;

    let err = session.execute("call crash").await.unwrap_err();
    assert!(matches!(err, CoreError::Mcp(McpError::ConnectionFailed(_))));
    assert_eq!(session.phase(), SessionPhase::Closed);
}

#[tokio::test]
async fn test_exit_closes_connection() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = connected(&transport).await;

    let output = session.execute("quit").await.unwrap();
    assert!(output.exit);
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert_eq!(transport.close_count(), 1);

    session.close().await;
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn test_list_refreshes_tools() {
    let transport = MockTransport::compliant(&["search"]);
    let mut session = connected(&transport).await;

    transport.set_reply(
        "tools/list",
        MockReply::Result(json!({"tools": [{"name": "search"}, {"name": "fetch"}]})),
    );
    let output = session.execute("list").await.unwrap();
    assert!(output.text.contains("Available tools (2):"));

    session.execute("call fetch").await.unwrap();
    assert_eq!(transport.request_count("tools/call"), 1);
}

fn request(tool: &str, provider: &str, count_tokens: bool) -> OneShotRequest {
    OneShotRequest {
        tool: tool.to_string(),
        args: json!({"q": "x"}),
        provider: provider.to_string(),
        model: "claude-sonnet-3.5".to_string(),
        overhead: 100,
        count_tokens,
    }
}

#[tokio::test]
async fn test_run_once_with_analysis() {
    let transport = MockTransport::compliant(&["search"]);
    let connector = MockConnector::new(transport.clone());
    let factory = FixedCounterFactory::new(FixedTokenCounter::new(12, 340));

    let report = run_once(&server(), request("search", "anthropic", true), &connector, &factory)
        .await
        .unwrap();

    assert_eq!(report.server, "mock");
    assert_eq!(report.result.flatten(), "ok");
    let breakdown = report.analysis.unwrap().unwrap();
    assert_eq!(breakdown.total_tokens, 452);
    assert_eq!(breakdown.model, "claude-3-5-sonnet-20241022");
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn test_run_once_unsupported_provider_never_connects() {
    let transport = MockTransport::compliant(&["search"]);
    let connector = MockConnector::new(transport.clone());
    let factory = FixedCounterFactory::new(FixedTokenCounter::new(1, 1));

    let err = run_once(&server(), request("search", "openai", true), &connector, &factory)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Provider(ProviderError::UnsupportedProvider(_))
    ));
    assert_eq!(connector.connect_count(), 0);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_run_once_without_tokens() {
    let transport = MockTransport::compliant(&["search"]);
    let connector = MockConnector::new(transport.clone());
    let factory = FixedCounterFactory::new(FixedTokenCounter::new(1, 1));

    let report = run_once(&server(), request("search", "openai", false), &connector, &factory)
        .await
        .unwrap();
    assert!(report.analysis.is_none());
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn test_run_once_unknown_tool_disconnects() {
    let transport = MockTransport::compliant(&["search"]);
    let connector = MockConnector::new(transport.clone());
    let factory = FixedCounterFactory::new(FixedTokenCounter::new(1, 1));

    let err = run_once(&server(), request("nope", "anthropic", false), &connector, &factory)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Mcp(McpError::ToolNotFound(_))));
    assert_eq!(transport.request_count("tools/call"), 0);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn test_run_once_without_discovery_support() {
    let transport = MockTransport::compliant(&["search"])
        .with_reply("tools/list", MockReply::rpc_error(-32601, "Method not found"))
        .with_tool_result(json!({"answer": 42}));
    let connector = MockConnector::new(transport.clone());
    let factory = FixedCounterFactory::new(FixedTokenCounter::new(1, 1));

    let report = run_once(&server(), request("lookup", "anthropic", false), &connector, &factory)
        .await
        .unwrap();
    assert!(matches!(report.mode, ConnectionMode::Degraded { .. }));
    assert!(report.result.non_standard);
    assert_eq!(transport.request_count("tools/call"), 1);

    let discovery = discover(&server(), &connector).await.unwrap();
    assert_eq!(discovery.tools.len(), 1);
    assert_eq!(discovery.tools[0].name, "unknown");
}

#[tokio::test]
async fn test_discover_reports_mode_and_tools() {
    let transport = MockTransport::compliant(&["a", "b", "c"]);
    let connector = MockConnector::new(transport.clone());

    let discovery = discover(&server(), &connector).await.unwrap();
    assert_eq!(discovery.tools.len(), 3);
    assert!(matches!(discovery.mode, ConnectionMode::Standard { .. }));
    assert_eq!(transport.close_count(), 1);
}

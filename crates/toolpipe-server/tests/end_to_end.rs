//! Drives the real `toolpipe-server` binary through the blocking client.

use serde_json::json;
use std::time::Duration;
use toolpipe_mcp::{McpError, ProcessSupervisor, ServerEndpoint, ToolClient};

fn endpoint() -> ServerEndpoint {
    ServerEndpoint::new(env!("CARGO_BIN_EXE_toolpipe-server")).with_timeout_ms(10_000)
}

#[test]
fn calc_evaluates_expression() {
    let client = ToolClient::new(endpoint());
    let value = client
        .call_tool("calc", json!({"expression": "2+2*3"}))
        .unwrap();
    assert_eq!(value, json!({"expression": "2+2*3", "result": 8}));
    assert_eq!(client.live_processes(), 0);
}

#[test]
fn calc_rejects_unsafe_characters_as_a_value() {
    let client = ToolClient::new(endpoint());
    let value = client
        .call_tool("calc", json!({"expression": "2+;rm"}))
        .unwrap();
    assert_eq!(value, json!({"error": "Unsupported characters in expression."}));
}

#[test]
fn list_tools_is_stable_across_calls() {
    let client = ToolClient::new(endpoint());
    let first = client.list_tools().unwrap();
    let second = client.list_tools().unwrap();
    assert_eq!(first, second);

    let names: Vec<&str> = first.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["calc", "fetch_url", "web_search"]);
    assert!(first.iter().all(|t| !t.description.is_empty()));
}

#[test]
fn unknown_tool_is_a_per_call_error() {
    let client = ToolClient::new(endpoint());
    let err = client.call_tool("does_not_exist", json!({})).unwrap_err();
    assert!(matches!(&err, McpError::ToolNotFound { name } if name == "does_not_exist"));
    assert!(!err.is_session_fatal());
    assert_eq!(client.live_processes(), 0);
}

#[test]
fn missing_argument_is_invalid_arguments() {
    let client = ToolClient::new(endpoint());
    let err = client.call_tool("calc", json!({})).unwrap_err();
    assert!(matches!(err, McpError::InvalidArguments { tool, .. } if tool == "calc"));
}

#[test]
fn stderr_log_receives_host_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("tool-host.log");
    let client = ToolClient::new(endpoint().with_arg("--verbose").with_stderr_log(&log))
        .with_timeout(Duration::from_secs(10));

    client.call_tool("calc", json!({"expression": "1+1"})).unwrap();

    let logged = std::fs::read_to_string(&log).unwrap();
    assert!(logged.contains("toolpipe-server"));
}

#[tokio::test]
async fn session_stays_usable_after_unknown_tool() {
    let supervisor = ProcessSupervisor::new(endpoint());
    let (missing, valid) = supervisor
        .run(|session| async move {
            let missing = session.call("does_not_exist", json!({})).await;
            let valid = session.call("calc", json!({"expression": "7//2"})).await?;
            Ok((missing, valid))
        })
        .await
        .unwrap();

    assert!(matches!(missing, Err(McpError::ToolNotFound { .. })));
    assert_eq!(valid, json!({"expression": "7//2", "result": 3}));
    assert_eq!(supervisor.live_processes(), 0);
}

#[tokio::test]
async fn concurrent_calls_on_one_host_are_routed_by_id() {
    let supervisor = ProcessSupervisor::new(endpoint());
    let results = supervisor
        .run(|session| async move {
            let calls = (1..=8).map(|i| {
                let session = session.clone();
                async move {
                    session
                        .call("calc", json!({"expression": format!("{i}*{i}")}))
                        .await
                }
            });
            futures_util::future::try_join_all(calls).await
        })
        .await
        .unwrap();

    for (i, value) in (1..=8i64).zip(results) {
        assert_eq!(value["result"], i * i);
    }
}

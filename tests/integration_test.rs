// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Integration tests for vigil's core logic using the mock model provider.
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use vigil_config::{AgentConfig, AgentMode, Config};
use vigil_core::{Agent, AgentRuntimeContext};
use vigil_model::MockProvider;
use vigil_tools::{events::ToolEvent, ToolRegistry};

fn mock_agent(mode: AgentMode) -> Agent {
    let model: Arc<dyn vigil_model::ModelProvider> = Arc::new(MockProvider);
    let tools = Arc::new(ToolRegistry::default());
    let config = Arc::new(AgentConfig::default());
    let mode_lock = Arc::new(Mutex::new(mode));
    let (_tx, tool_event_rx) = mpsc::channel::<ToolEvent>(64);
    Agent::new(
        model,
        tools,
        config,
        AgentRuntimeContext::default(),
        mode_lock,
        tool_event_rx,
        128_000,
    )
}

#[tokio::test]
async fn agent_returns_mock_response() {
    let mut agent = mock_agent(AgentMode::Agent);
    let (tx, mut rx) = mpsc::channel(64);
    agent.submit("hello", tx).await.unwrap();

    let mut got_text = false;
    while let Ok(event) = rx.try_recv() {
        if let vigil_core::AgentEvent::TextDelta(t) = event {
            assert!(t.contains("MOCK"));
            got_text = true;
        }
    }
    assert!(got_text, "expected at least one TextDelta event");
}

#[test]
fn config_defaults_are_valid() {
    let cfg = Config::default();
    assert_eq!(cfg.model.provider, "mock");
    assert!(cfg.agent.max_tool_rounds > 0);
    assert!(cfg.agent.compaction_threshold > 0.0);
}

#[test]
fn tool_policy_auto_approve() {
    use vigil_config::ToolsConfig;
    use vigil_tools::{ApprovalPolicy, ToolPolicy};

    let cfg = ToolsConfig {
        auto_approve_patterns: vec!["cat *".into(), "ls *".into()],
        ..ToolsConfig::default()
    };
    let policy = ToolPolicy::from_config(&cfg);
    assert_eq!(policy.decide("cat /etc/hosts"), ApprovalPolicy::Auto);
    assert_eq!(policy.decide("ls /tmp"), ApprovalPolicy::Auto);
}

#[test]
fn tool_policy_deny() {
    use vigil_config::ToolsConfig;
    use vigil_tools::{ApprovalPolicy, ToolPolicy};

    let cfg = ToolsConfig {
        deny_patterns: vec!["rm -rf /*".into()],
        ..ToolsConfig::default()
    };
    let policy = ToolPolicy::from_config(&cfg);
    assert_eq!(policy.decide("rm -rf /*"), ApprovalPolicy::Deny);
}

#[test]
fn tool_policy_unmatched_falls_back_to_ask() {
    use vigil_config::ToolsConfig;
    use vigil_tools::{ApprovalPolicy, ToolPolicy};

    let policy = ToolPolicy::from_config(&ToolsConfig::default());
    assert_eq!(policy.decide("curl https://example.com"), ApprovalPolicy::Ask);
}

#[tokio::test]
async fn shell_tool_executes_echo() {
    use vigil_tools::Tool;
    use vigil_tools::{ShellTool, ToolCall};

    let tool = ShellTool::default();
    let call = ToolCall {
        id: "1".into(),
        name: "shell".into(),
        args: serde_json::json!({ "shell_command": "echo hello_world" }),
    };
    let output = tool.execute(&call).await;
    assert!(!output.is_error);
    assert!(output.content.contains("hello_world"));
}

#[tokio::test]
async fn fs_tool_write_read_roundtrip() {
    use vigil_tools::{FsTool, Tool, ToolCall};

    let path = format!("/tmp/vigil_test_{}_{}.txt", std::process::id(), line!());

    let write_call = ToolCall {
        id: "w1".into(),
        name: "fs".into(),
        args: serde_json::json!({ "operation": "write", "path": path, "text": "roundtrip" }),
    };
    let wo = FsTool.execute(&write_call).await;
    assert!(!wo.is_error, "write failed: {}", wo.content);

    let read_call = ToolCall {
        id: "r1".into(),
        name: "fs".into(),
        args: serde_json::json!({ "operation": "read", "path": path, "text": "" }),
    };
    let ro = FsTool.execute(&read_call).await;
    assert!(!ro.is_error);
    assert!(ro.content.contains("roundtrip"));

    let _ = std::fs::remove_file(&path);
}

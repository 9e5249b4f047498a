// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Wires `vigil-subagent`'s `Executor`/`SubagentNotifier` ports to the
//! `Engine`: a subagent run is just another session, and completion is
//! re-injected into the parent session as a synthetic inbound message
//! (§2: "re-inject completion messages back into the parent session").

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use vigil_engine::{Engine, InboundMessage};
use vigil_store::{SubagentRun, SubagentStatus};
use vigil_subagent::{Executor, SubagentNotifier};

/// Runs a subagent task through the same `Engine` as every other session,
/// under its own session id so it gets a fresh `Agent` with full tool
/// access and independent turn history.
pub struct EngineExecutor {
    engine: Arc<Engine>,
}

impl EngineExecutor {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Executor for EngineExecutor {
    async fn run(&self, run: &SubagentRun) -> anyhow::Result<String> {
        let session_id = format!("subagent:{}", run.run_id);
        let inbound = InboundMessage {
            session_id: session_id.clone(),
            request_id: run.run_id.clone(),
            channel: "subagent".to_string(),
            chat_id: session_id,
            sender_id: run.parent_session_id.clone(),
            content: run.task.clone(),
            media: Vec::new(),
            metadata: serde_json::json!({ "depth": run.depth, "parent_session_id": run.parent_session_id }),
            created_at: vigil_store::Store::now(),
        };
        Ok(self.engine.ask(inbound).await?)
    }
}

/// Delivers a subagent's terminal outcome back into the session that
/// spawned it, as a synthetic `role=user` turn the parent `Agent` picks up
/// on its next turn.
pub struct EngineNotifier {
    engine: Arc<Engine>,
}

impl EngineNotifier {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl SubagentNotifier for EngineNotifier {
    async fn notify(&self, parent_session_id: &str, run: &SubagentRun) {
        let content = match run.status {
            SubagentStatus::Succeeded => format!(
                "Subagent task completed: {}\n\nResult:\n{}",
                run.task,
                run.result.clone().unwrap_or_default()
            ),
            SubagentStatus::Failed => format!(
                "Subagent task failed: {}\n\nError:\n{}",
                run.task,
                run.error.clone().unwrap_or_default()
            ),
            SubagentStatus::TimedOut => format!("Subagent task timed out: {}", run.task),
            SubagentStatus::Cancelled => format!("Subagent task was cancelled: {}", run.task),
            SubagentStatus::Queued | SubagentStatus::Running => return,
        };

        let inbound = InboundMessage {
            session_id: parent_session_id.to_string(),
            request_id: run.run_id.clone(),
            channel: "subagent".to_string(),
            chat_id: parent_session_id.to_string(),
            sender_id: "subagent".to_string(),
            content,
            media: Vec::new(),
            metadata: serde_json::json!({ "run_id": run.run_id, "status": run.status }),
            created_at: vigil_store::Store::now(),
        };

        if let Err(e) = self.engine.submit(inbound).await {
            warn!(run_id = %run.run_id, parent_session_id, error = %e, "failed to deliver subagent completion to parent session");
        }
    }
}

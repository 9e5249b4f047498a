// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use vigil_store::SubagentRun;

/// Runs the actual work behind a [`SubagentRun`]. `vigil-engine` supplies the
/// real implementation (a nested `Agent`, grounded in the same pattern a
/// coding agent's task tool uses to spawn a sub-agent); tests use a
/// deterministic stand-in.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, run: &SubagentRun) -> anyhow::Result<String>;
}

/// Notified when a run reaches a terminal state, so the parent session can
/// have the result re-injected as a synthetic inbound message. Optional:
/// configured via `SubagentConfig::notify_on_complete`.
#[async_trait]
pub trait SubagentNotifier: Send + Sync {
    async fn notify(&self, parent_session_id: &str, run: &SubagentRun);
}

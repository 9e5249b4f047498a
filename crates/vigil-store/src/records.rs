// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Typed shapes for everything the store persists. Each type maps onto one
//! bucket (table); see [`crate::conn`] for the bucket list.

use serde::{Deserialize, Serialize};

/// One message in a session's history, as appended by the Engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub seq: i64,
    pub role: String,
    pub content: String,
    pub token_count: Option<u32>,
    pub created_at: String,
}

/// Per-session bookkeeping: last-active time, compaction state, mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMeta {
    pub session_id: String,
    pub channel: String,
    pub mode: String,
    pub token_count: u32,
    pub max_tokens: u32,
    pub created_at: String,
    pub last_active_at: String,
    pub compacted_count: u32,
}

/// A single tool invocation observed during a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolEvent {
    pub id: String,
    pub session_id: String,
    pub turn_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub is_error: bool,
    pub started_at: String,
    pub finished_at: Option<String>,
}

/// A scheduled unit of work: a cron entry, an at-schedule, or an interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub schedule: String,
    pub session_id: Option<String>,
    pub payload: serde_json::Value,
    pub enabled: bool,
    pub created_at: String,
    pub next_run_at: Option<String>,
    /// When this job last fired (§3 `state.last_run_at`).
    #[serde(default)]
    pub last_run_at: Option<String>,
    /// Outcome of the last fire — `"ok"` or `"error"` (§3 `state.last_status`).
    #[serde(default)]
    pub last_status: Option<String>,
    /// Error message of the last fire, if it failed (§3 `state.last_error`).
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// One execution record of a [`Job`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRun {
    pub id: String,
    pub job_id: String,
    pub status: JobRunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubagentStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

/// A durable background subagent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubagentRun {
    pub run_id: String,
    pub parent_session_id: String,
    pub depth: u32,
    pub task: String,
    pub status: SubagentStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    #[serde(default = "default_subagent_timeout_sec")]
    pub timeout_sec: f64,
    #[serde(default)]
    pub notify_on_complete: bool,
    pub queued_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
}

fn default_subagent_timeout_sec() -> f64 {
    300.0
}

/// A progress/status event emitted by a running subagent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubagentEvent {
    pub id: String,
    pub run_id: String,
    pub seq: i64,
    pub kind: String,
    pub detail: serde_json::Value,
    pub created_at: String,
}

/// Cooperative cancellation flag, polled by a subagent worker and cleared
/// once observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelSignal {
    pub run_id: String,
    pub requested_at: String,
    pub reason: Option<String>,
}

/// Rolling token-usage counter for one budget scope (`global`,
/// `session:<id>`, `subagent:<run_id>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetCounter {
    pub scope: String,
    pub window_start: String,
    pub used_tokens: u64,
    pub limit_tokens: u64,
}

/// A TTL'd preflight reservation against a [`BudgetCounter`], committed or
/// aborted before it expires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetReservation {
    pub id: String,
    pub scope: String,
    pub estimated_tokens: u64,
    pub created_at: String,
    pub expires_at: String,
}

/// Operator override that relaxes or tightens budget enforcement mode for a
/// scope (`soft`, `hard`, `hybrid`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSafetyOverride {
    pub scope: String,
    pub mode: String,
    pub set_at: String,
    pub set_by: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatOutcome {
    Ran,
    SkippedEmpty,
    Failed,
}

/// One tick of the heartbeat loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatRun {
    pub id: String,
    pub ticked_at: String,
    pub outcome: HeartbeatOutcome,
    pub note: Option<String>,
}

/// A kanban column, ordered by `position`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionColumn {
    pub id: String,
    pub name: String,
    pub position: i64,
}

/// A kanban card within a [`MissionColumn`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionTask {
    pub id: String,
    pub column_id: String,
    pub title: String,
    pub detail: Option<String>,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-actor mailbox checkpoint, recorded so a restart can resume draining a
/// session's ordered queue without replaying already-applied turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorCheckpoint {
    pub session_id: String,
    pub last_applied_seq: i64,
    pub updated_at: String,
}

/// Board-wide kanban policy (WIP limits, default column), singleton record
/// keyed by a fixed id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionPolicy {
    pub default_column_id: Option<String>,
    pub wip_limits: std::collections::BTreeMap<String, u32>,
}

/// One day's rolled-up token/request usage, for the analytics endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageDaily {
    pub date: String,
    pub scope: String,
    pub requests: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// An allowlisted remote peer for the `/api/manage/federation/*` endpoints.
///
/// Vigil does not implement any cross-host protocol (no cluster consensus
/// per the Non-goals) — this is a read/list/add/remove registry only, so an
/// operator can pre-declare peers a future federation feature would trust.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FederationPeer {
    pub id: String,
    pub display_name: String,
    pub added_at: String,
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The `Store`: a typed facade over [`crate::conn::ConnPool`] implementing
//! the bucket operations named in the component design (`AppendTurn`,
//! `Window`, `PutJob`, `ListJobs`, budget reservation lifecycle, and so on).

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;
use ulid::Generator;

use crate::conn::ConnPool;
use crate::error::{Result, StoreError};
use crate::records::*;

/// Embedded, durable store backing all of Vigil's operational state.
///
/// Cloning is cheap: internally this is a handle (`Arc`-like) around the
/// writer thread and reader pool, so every component can hold its own
/// `Store` without a shared-lock bottleneck.
#[derive(Clone)]
pub struct Store {
    conn: std::sync::Arc<ConnPool>,
    ids: std::sync::Arc<Mutex<Generator>>,
}

impl Store {
    /// Open (creating if needed) the store file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = ConnPool::open(path).map_err(StoreError::Internal)?;
        Ok(Self {
            conn: std::sync::Arc::new(conn),
            ids: std::sync::Arc::new(Mutex::new(Generator::new())),
        })
    }

    /// In-memory store for tests: a temp file backs it so the single-writer
    /// thread and reader pool behave exactly as in production.
    #[cfg(any(test, feature = "test-util"))]
    pub fn open_temp() -> Result<(Self, tempfile::TempDir)> {
        let dir = tempfile::tempdir().map_err(|e| StoreError::Internal(e.into()))?;
        let store = Self::open(&dir.path().join("vigil.sqlite3"))?;
        Ok((store, dir))
    }

    /// Monotonic, lexicographically sortable id. Used as the trailing
    /// component of composite keys (`<session>:<ulid>`) so a `Window` scan
    /// is simply a key-range read in insertion order.
    pub fn next_id(&self) -> String {
        let mut gen = self.ids.lock().unwrap();
        loop {
            if let Ok(ulid) = gen.generate() {
                return ulid.to_string();
            }
            // Generator only errors if called more than 2^80 times within
            // the same millisecond; yield and retry on the next tick.
            std::thread::yield_now();
        }
    }

    pub fn now() -> String {
        Utc::now().to_rfc3339()
    }

    async fn put<T: Serialize + Send + 'static>(&self, bucket: &'static str, key: String, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| StoreError::Internal(e.into()))?;
        self.conn
            .write(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO {bucket} (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value"
                    ),
                    params![key, json],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::Internal)
    }

    async fn get<T: DeserializeOwned + Send + 'static>(&self, bucket: &'static str, key: String) -> Result<Option<T>> {
        self.conn
            .read(move |conn| {
                let value: Option<String> = conn
                    .query_row(&format!("SELECT value FROM {bucket} WHERE key = ?1"), [&key], |r| r.get(0))
                    .optional()?;
                Ok(match value {
                    Some(v) => Some(serde_json::from_str(&v)?),
                    None => None,
                })
            })
            .await
            .map_err(StoreError::Internal)
    }

    async fn delete(&self, bucket: &'static str, key: String) -> Result<()> {
        self.conn
            .write(move |conn| {
                conn.execute(&format!("DELETE FROM {bucket} WHERE key = ?1"), [&key])?;
                Ok(())
            })
            .await
            .map_err(StoreError::Internal)
    }

    /// Key-range scan `[prefix, prefix+0xff)`, ordered ascending, limited to
    /// `limit` rows, decoded as `T`. This is the `Window` primitive every
    /// by-session/by-scope listing is built on.
    ///
    /// A row whose value fails to deserialize (truncated/corrupt write) is
    /// logged and skipped rather than failing the whole scan — per §4.1,
    /// one bad record must never fail a list.
    async fn scan_prefix<T: DeserializeOwned + Send + 'static>(
        &self,
        bucket: &'static str,
        prefix: String,
        limit: usize,
    ) -> Result<Vec<T>> {
        self.conn
            .read(move |conn| {
                let upper = format!("{prefix}\u{10ffff}");
                let rows = conn.query_row_prefix(bucket, &prefix, &upper, limit)?;
                Ok(decode_rows_lossy(bucket, rows))
            })
            .await
            .map_err(StoreError::Internal)
    }

    /// Like [`Store::scan_prefix`], but returns the most recent `limit` rows
    /// of the prefix (newest-key-first scan, reversed back to ascending
    /// order) instead of the oldest.
    async fn scan_prefix_recent<T: DeserializeOwned + Send + 'static>(
        &self,
        bucket: &'static str,
        prefix: String,
        limit: usize,
    ) -> Result<Vec<T>> {
        self.conn
            .read(move |conn| {
                let upper = format!("{prefix}\u{10ffff}");
                let mut rows = conn.query_row_prefix_desc(bucket, &prefix, &upper, limit)?;
                rows.reverse();
                Ok(decode_rows_lossy(bucket, rows))
            })
            .await
            .map_err(StoreError::Internal)
    }

    // ---- KV bucket -------------------------------------------------------

    pub async fn put_kv(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.put("kv", key.to_string(), &value).await
    }

    pub async fn get_kv(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.get("kv", key.to_string()).await
    }

    pub async fn delete_kv(&self, key: &str) -> Result<()> {
        self.delete("kv", key.to_string()).await
    }

    // ---- turns -------------------------------------------------------

    /// Append a turn to a session's history; `turn.id` must already be a
    /// `next_id()`-generated, monotonic value.
    pub async fn append_turn(&self, turn: Turn) -> Result<()> {
        let key = format!("{}:{}", turn.session_id, turn.id);
        self.put("turns", key, &turn).await
    }

    /// The most recent `limit` turns of `session_id`, oldest first.
    pub async fn window_turns(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let prefix = format!("{session_id}:");
        self.scan_prefix_recent("turns", prefix, limit).await
    }

    // ---- session_meta -------------------------------------------------------

    pub async fn put_session_meta(&self, meta: SessionMeta) -> Result<()> {
        let key = meta.session_id.clone();
        self.put("session_meta", key, &meta).await
    }

    pub async fn get_session_meta(&self, session_id: &str) -> Result<Option<SessionMeta>> {
        self.get("session_meta", session_id.to_string()).await
    }

    // ---- tool_events -------------------------------------------------------

    pub async fn put_tool_event(&self, event: ToolEvent) -> Result<()> {
        let key = format!("{}:{}", event.session_id, event.id);
        self.put("tool_events", key, &event).await
    }

    pub async fn list_tool_events(&self, session_id: &str, limit: usize) -> Result<Vec<ToolEvent>> {
        let prefix = format!("{session_id}:");
        self.scan_prefix("tool_events", prefix, limit).await
    }

    // ---- jobs / job_runs -------------------------------------------------------

    pub async fn put_job(&self, job: Job) -> Result<()> {
        let key = job.id.clone();
        self.put("jobs", key, &job).await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        self.get("jobs", job_id.to_string()).await
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.delete("jobs", job_id.to_string()).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.scan_prefix("jobs", String::new(), usize::MAX).await
    }

    pub async fn put_job_run(&self, run: JobRun) -> Result<()> {
        let key = format!("{}:{}", run.job_id, run.id);
        self.put("job_runs", key, &run).await
    }

    pub async fn list_job_runs(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>> {
        let prefix = format!("{job_id}:");
        self.scan_prefix("job_runs", prefix, limit).await
    }

    // ---- subagent_runs / subagent_events -------------------------------------------------------

    pub async fn put_subagent_run(&self, run: SubagentRun) -> Result<()> {
        let key = run.run_id.clone();
        self.put("subagent_runs", key, &run).await
    }

    pub async fn get_subagent_run(&self, run_id: &str) -> Result<Option<SubagentRun>> {
        self.get("subagent_runs", run_id.to_string()).await
    }

    /// All runs in a given status, across every session. Used at startup to
    /// recover `queued`/`running` runs that were in flight when the process
    /// last stopped.
    pub async fn list_subagent_runs_by_status(&self, status: SubagentStatus) -> Result<Vec<SubagentRun>> {
        let all: Vec<SubagentRun> = self.scan_prefix("subagent_runs", String::new(), usize::MAX).await?;
        Ok(all.into_iter().filter(|r| r.status == status).collect())
    }

    pub async fn put_subagent_event(&self, event: SubagentEvent) -> Result<()> {
        let key = format!("{}:{}", event.run_id, event.id);
        self.put("subagent_events", key, &event).await
    }

    pub async fn list_subagent_events(&self, run_id: &str, limit: usize) -> Result<Vec<SubagentEvent>> {
        let prefix = format!("{run_id}:");
        self.scan_prefix("subagent_events", prefix, limit).await
    }

    // ---- cancellation -------------------------------------------------------

    pub async fn request_cancel(&self, signal: CancelSignal) -> Result<()> {
        let key = signal.run_id.clone();
        self.put("kv", format!("cancel:{key}"), &signal).await
    }

    pub async fn take_cancel(&self, run_id: &str) -> Result<Option<CancelSignal>> {
        let key = format!("cancel:{run_id}");
        let signal: Option<CancelSignal> = self.get("kv", key.clone()).await?;
        if signal.is_some() {
            self.delete("kv", key).await?;
        }
        Ok(signal)
    }

    // ---- budget -------------------------------------------------------

    pub async fn get_budget_counter(&self, scope: &str) -> Result<Option<BudgetCounter>> {
        self.get("budget_counters", scope.to_string()).await
    }

    pub async fn put_budget_counter(&self, counter: BudgetCounter) -> Result<()> {
        let key = counter.scope.clone();
        self.put("budget_counters", key, &counter).await
    }

    pub async fn put_budget_reservation(&self, reservation: BudgetReservation) -> Result<()> {
        let key = format!("{}:{}", reservation.scope, reservation.id);
        self.put("budget_reservations", key, &reservation).await
    }

    pub async fn get_budget_reservation(&self, scope: &str, id: &str) -> Result<Option<BudgetReservation>> {
        self.get("budget_reservations", format!("{scope}:{id}")).await
    }

    pub async fn delete_budget_reservation(&self, scope: &str, id: &str) -> Result<()> {
        self.delete("budget_reservations", format!("{scope}:{id}")).await
    }

    pub async fn list_budget_reservations(&self, scope: &str) -> Result<Vec<BudgetReservation>> {
        let prefix = format!("{scope}:");
        self.scan_prefix("budget_reservations", prefix, usize::MAX).await
    }

    pub async fn append_budget_event(&self, scope: &str, event: serde_json::Value) -> Result<()> {
        let key = format!("{}:{}", scope, self.next_id());
        self.put("budget_events", key, &event).await
    }

    pub async fn get_token_safety_override(&self, scope: &str) -> Result<Option<TokenSafetyOverride>> {
        self.get("token_safety_override", scope.to_string()).await
    }

    pub async fn put_token_safety_override(&self, ov: TokenSafetyOverride) -> Result<()> {
        let key = ov.scope.clone();
        self.put("token_safety_override", key, &ov).await
    }

    // ---- heartbeat -------------------------------------------------------

    pub async fn put_heartbeat_run(&self, run: HeartbeatRun) -> Result<()> {
        let key = format!("{}:{}", run.ticked_at, run.id);
        self.put("heartbeat_runs", key, &run).await
    }

    pub async fn list_heartbeat_runs(&self, limit: usize) -> Result<Vec<HeartbeatRun>> {
        self.scan_prefix("heartbeat_runs", String::new(), limit).await
    }

    // ---- mission kanban -------------------------------------------------------

    pub async fn put_mission_column(&self, column: MissionColumn) -> Result<()> {
        let key = column.id.clone();
        self.put("mission_columns", key, &column).await
    }

    pub async fn list_mission_columns(&self) -> Result<Vec<MissionColumn>> {
        let mut cols: Vec<MissionColumn> = self.scan_prefix("mission_columns", String::new(), usize::MAX).await?;
        cols.sort_by_key(|c| c.position);
        Ok(cols)
    }

    pub async fn put_mission_task(&self, task: MissionTask) -> Result<()> {
        let key = format!("{}:{}", task.column_id, task.id);
        self.put("mission_tasks", key, &task).await
    }

    pub async fn list_mission_tasks(&self, column_id: &str) -> Result<Vec<MissionTask>> {
        let prefix = format!("{column_id}:");
        let mut tasks: Vec<MissionTask> = self.scan_prefix("mission_tasks", prefix, usize::MAX).await?;
        tasks.sort_by_key(|t| t.position);
        Ok(tasks)
    }

    pub async fn get_mission_policy(&self) -> Result<Option<MissionPolicy>> {
        self.get("mission_policy", "singleton".to_string()).await
    }

    pub async fn put_mission_policy(&self, policy: MissionPolicy) -> Result<()> {
        self.put("mission_policy", "singleton".to_string(), &policy).await
    }

    // ---- actor checkpoints -------------------------------------------------------

    pub async fn put_actor_checkpoint(&self, checkpoint: ActorCheckpoint) -> Result<()> {
        let key = checkpoint.session_id.clone();
        self.put("actor_checkpoints", key, &checkpoint).await
    }

    pub async fn get_actor_checkpoint(&self, session_id: &str) -> Result<Option<ActorCheckpoint>> {
        self.get("actor_checkpoints", session_id.to_string()).await
    }

    // ---- usage -------------------------------------------------------

    pub async fn put_usage_daily(&self, usage: UsageDaily) -> Result<()> {
        let key = format!("{}:{}", usage.date, usage.scope);
        self.put("usage_daily", key, &usage).await
    }

    pub async fn list_usage_daily(&self, date_prefix: &str) -> Result<Vec<UsageDaily>> {
        self.scan_prefix("usage_daily", date_prefix.to_string(), usize::MAX).await
    }

    // ---- federation peers -------------------------------------------------------

    pub async fn put_federation_peer(&self, peer: FederationPeer) -> Result<()> {
        let key = peer.id.clone();
        self.put("federation_peers", key, &peer).await
    }

    pub async fn delete_federation_peer(&self, id: &str) -> Result<()> {
        self.delete("federation_peers", id.to_string()).await
    }

    pub async fn list_federation_peers(&self) -> Result<Vec<FederationPeer>> {
        self.scan_prefix("federation_peers", String::new(), usize::MAX).await
    }

    pub fn close(&self) {
        self.conn.close();
    }
}

/// Narrow extension trait so `Connection` gets a prefix-scan helper without
/// pulling a query builder dependency into the workspace.
trait PrefixScan {
    fn query_row_prefix(&self, bucket: &str, lower: &str, upper: &str, limit: usize) -> rusqlite::Result<Vec<String>>;
    fn query_row_prefix_desc(&self, bucket: &str, lower: &str, upper: &str, limit: usize) -> rusqlite::Result<Vec<String>>;
}

impl PrefixScan for Connection {
    fn query_row_prefix(&self, bucket: &str, lower: &str, upper: &str, limit: usize) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.prepare(&format!(
            "SELECT value FROM {bucket} WHERE key >= ?1 AND key < ?2 ORDER BY key ASC LIMIT ?3"
        ))?;
        let limit = if limit == usize::MAX { i64::MAX } else { limit as i64 };
        let rows = stmt.query_map(params![lower, upper, limit], |r| r.get::<_, String>(0))?;
        rows.collect()
    }

    fn query_row_prefix_desc(&self, bucket: &str, lower: &str, upper: &str, limit: usize) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.prepare(&format!(
            "SELECT value FROM {bucket} WHERE key >= ?1 AND key < ?2 ORDER BY key DESC LIMIT ?3"
        ))?;
        let limit = if limit == usize::MAX { i64::MAX } else { limit as i64 };
        let rows = stmt.query_map(params![lower, upper, limit], |r| r.get::<_, String>(0))?;
        rows.collect()
    }
}

/// Decode each raw JSON row as `T`, logging and dropping any row that fails
/// to deserialize instead of failing the whole scan (§4.1: a truncated or
/// corrupt value must never fail a list).
fn decode_rows_lossy<T: DeserializeOwned>(bucket: &str, rows: Vec<String>) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len());
    for raw in rows {
        match serde_json::from_str(&raw) {
            Ok(value) => out.push(value),
            Err(e) => warn!(bucket, error = %e, "skipping corrupt record during scan"),
        }
    }
    out
}

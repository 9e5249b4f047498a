// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Periodic self-prompt fed from a workspace file (default `HEARTBEAT.md`).
//! A tick is a no-op when the file is empty under [`is_heartbeat_empty`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use vigil_engine::{Engine, InboundMessage};
use vigil_store::{HeartbeatOutcome, HeartbeatRun, Store};
use vigil_telemetry::Telemetry;

use crate::error::Result;

pub const HEARTBEAT_SESSION_ID: &str = "system:heartbeat";
const HEARTBEAT_PROMPT: &str = "Heartbeat tick: review the workspace state and act if anything needs attention.";

/// Notified once per completed tick, run or skipped.
#[async_trait]
pub trait HeartbeatObserver: Send + Sync {
    async fn on_heartbeat(&self, run: &HeartbeatRun);
}

/// The checkbox/heading/comment shapes that do **not** count toward a
/// heartbeat file having content, locked here rather than re-derived at each
/// call site.
///
/// A line is dropped before the emptiness check if it is:
/// - blank (whitespace only)
/// - a markdown heading (`#` .. `######` followed by space or end of line)
/// - an HTML comment on its own line (`<!-- ... -->`)
/// - a checklist item with no label text: `- [ ]`, `- [x]`, `- [X]`, `* [ ]`,
///   `* [x]`, `* [X]`, or the same with a numbered list marker (`1.`, `2.`, ...)
///
/// The file is "empty" iff no line survives this filter.
pub fn is_heartbeat_empty(content: &str) -> bool {
    !content.lines().any(|line| line_counts_as_content(line.trim()))
}

fn line_counts_as_content(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    if is_heading(line) {
        return false;
    }
    if is_html_comment(line) {
        return false;
    }
    if is_bare_checklist_item(line) {
        return false;
    }
    true
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return false;
    }
    let rest = &line[hashes..];
    rest.is_empty() || rest.starts_with(' ')
}

fn is_html_comment(line: &str) -> bool {
    line.starts_with("<!--") && line.ends_with("-->")
}

fn is_bare_checklist_item(line: &str) -> bool {
    let after_marker = if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        rest
    } else if let Some(idx) = line.find(". ") {
        let (head, rest) = line.split_at(idx);
        if head.chars().all(|c| c.is_ascii_digit()) && !head.is_empty() {
            &rest[2..]
        } else {
            return false;
        }
    } else {
        return false;
    };
    matches!(after_marker.trim(), "[ ]" | "[x]" | "[X]")
}

pub struct HeartbeatService {
    store: Store,
    engine: Arc<Engine>,
    telemetry: Arc<Telemetry>,
    workspace_root: PathBuf,
    state: Mutex<HeartbeatState>,
    observer: Option<Arc<dyn HeartbeatObserver>>,
}

struct HeartbeatState {
    interval_secs: u64,
    file_name: String,
    next_run_at: chrono::DateTime<chrono::Utc>,
    last_run: Option<HeartbeatRun>,
    running: bool,
}

impl HeartbeatService {
    pub fn new(
        store: Store,
        engine: Arc<Engine>,
        telemetry: Arc<Telemetry>,
        workspace_root: PathBuf,
        interval_secs: u64,
        file_name: String,
        observer: Option<Arc<dyn HeartbeatObserver>>,
    ) -> Arc<Self> {
        let next_run_at = chrono::Utc::now() + chrono::Duration::seconds(interval_secs as i64);
        Arc::new(Self {
            store,
            engine,
            telemetry,
            workspace_root,
            state: Mutex::new(HeartbeatState {
                interval_secs,
                file_name,
                next_run_at,
                last_run: None,
                running: false,
            }),
            observer,
        })
    }

    /// Spawn the interval-timer task. `SetInterval` reschedules the same
    /// loop by way of the shared `state.interval_secs`/`next_run_at` it reads
    /// each iteration.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let sleep_for = {
                    let state = this.state.lock().await;
                    let now = chrono::Utc::now();
                    (state.next_run_at - now).to_std().unwrap_or(Duration::from_secs(0))
                };
                tokio::time::sleep(sleep_for.max(Duration::from_millis(100))).await;
                this.telemetry.heartbeat_ticks();
                if let Err(e) = this.tick().await {
                    warn!(error = %e, "heartbeat tick failed");
                }
                let mut state = this.state.lock().await;
                state.next_run_at = chrono::Utc::now() + chrono::Duration::seconds(state.interval_secs as i64);
            }
        })
    }

    async fn heartbeat_file_path(&self) -> PathBuf {
        let state = self.state.lock().await;
        self.workspace_root.join(&state.file_name)
    }

    pub async fn tick(&self) -> Result<()> {
        self.run(false).await
    }

    /// Runs the handler synchronously regardless of file content.
    pub async fn trigger_now(&self) -> Result<()> {
        self.run(true).await
    }

    async fn run(&self, force: bool) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.running = true;
        }

        let path = self.heartbeat_file_path().await;
        let content = tokio::fs::read_to_string(&path).await.unwrap_or_default();

        let run = if !force && is_heartbeat_empty(&content) {
            self.telemetry.heartbeat_skipped_empty();
            HeartbeatRun {
                id: self.store.next_id(),
                ticked_at: Store::now(),
                outcome: HeartbeatOutcome::SkippedEmpty,
                note: None,
            }
        } else {
            let inbound = InboundMessage {
                session_id: HEARTBEAT_SESSION_ID.to_string(),
                request_id: self.store.next_id(),
                channel: "system".to_string(),
                chat_id: HEARTBEAT_SESSION_ID.to_string(),
                sender_id: "heartbeat".to_string(),
                content: HEARTBEAT_PROMPT.to_string(),
                media: Vec::new(),
                metadata: serde_json::json!({"heartbeat_file_content": content}),
                created_at: Store::now(),
            };
            match self.engine.ask(inbound).await {
                Ok(response) => {
                    self.telemetry.heartbeat_runs();
                    HeartbeatRun {
                        id: self.store.next_id(),
                        ticked_at: Store::now(),
                        outcome: HeartbeatOutcome::Ran,
                        note: Some(response),
                    }
                }
                Err(e) => {
                    self.telemetry.heartbeat_errors();
                    HeartbeatRun {
                        id: self.store.next_id(),
                        ticked_at: Store::now(),
                        outcome: HeartbeatOutcome::Failed,
                        note: Some(e.to_string()),
                    }
                }
            }
        };

        let _ = self.store.put_heartbeat_run(run.clone()).await;
        if let Some(observer) = &self.observer {
            observer.on_heartbeat(&run).await;
        }
        {
            let mut state = self.state.lock().await;
            state.last_run = Some(run);
            state.running = false;
        }
        info!(path = %path.display(), "heartbeat tick complete");
        Ok(())
    }

    /// Safe to call while running: resets the ticker and recomputes
    /// `next_run_at`.
    pub async fn set_interval(&self, interval_secs: u64) {
        let mut state = self.state.lock().await;
        state.interval_secs = interval_secs;
        state.next_run_at = chrono::Utc::now() + chrono::Duration::seconds(interval_secs as i64);
    }

    pub async fn last_run(&self) -> Option<HeartbeatRun> {
        self.state.lock().await.last_run.clone()
    }

    pub async fn next_run_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.state.lock().await.next_run_at
    }

    pub async fn running(&self) -> bool {
        self.state.lock().await.running
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `SubagentManager`: a durable worker pool. The persisted `SubagentRun` is
//! the recovery anchor; the in-memory channel is only a dispatch hint — a
//! run surviving a restart in `queued`/`running` is re-enqueued from Store
//! on [`SubagentManager::start`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use vigil_config::SubagentConfig;
use vigil_store::{CancelSignal, Store, SubagentEvent, SubagentRun, SubagentStatus};
use vigil_telemetry::Telemetry;

use crate::error::{Result, SubagentError};
use crate::executor::{Executor, SubagentNotifier};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A new background task, as handed to [`SubagentManager::enqueue`] by a
/// tool call (e.g. a `spawn`/`task` tool).
#[derive(Debug, Clone)]
pub struct SubagentRequest {
    pub parent_session_id: String,
    pub depth: u32,
    pub task: String,
    /// Overrides `SubagentConfig::default_timeout_secs` for this run only.
    pub timeout_sec: Option<f64>,
    /// Overrides `SubagentConfig::notify_on_complete` for this run only.
    pub notify_on_complete: Option<bool>,
}

fn is_terminal(status: SubagentStatus) -> bool {
    matches!(
        status,
        SubagentStatus::Succeeded | SubagentStatus::Failed | SubagentStatus::Cancelled | SubagentStatus::TimedOut
    )
}

pub struct SubagentManager {
    store: Store,
    telemetry: Arc<Telemetry>,
    config: SubagentConfig,
    executor: Arc<dyn Executor>,
    notifier: Option<Arc<dyn SubagentNotifier>>,
    tx: mpsc::Sender<String>,
    rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl SubagentManager {
    pub fn new(
        store: Store,
        telemetry: Arc<Telemetry>,
        config: SubagentConfig,
        executor: Arc<dyn Executor>,
        notifier: Option<Arc<dyn SubagentNotifier>>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.max_queue);
        Arc::new(Self {
            store,
            telemetry,
            config,
            executor,
            notifier,
            tx,
            rx: Mutex::new(Some(rx)),
        })
    }

    /// Spawn `max_concurrent` worker tasks and re-enqueue any run left
    /// `queued`/`running` by a previous process.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let rx = self
            .rx
            .lock()
            .await
            .take()
            .expect("SubagentManager::start called more than once");
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..self.config.max_concurrent.max(1) {
            let manager = self.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let run_id = rx.lock().await.recv().await;
                    match run_id {
                        Some(id) => manager.execute_run(id).await,
                        None => break,
                    }
                }
                info!(worker_id, "subagent worker stopped: queue closed");
            });
        }

        self.recover().await
    }

    async fn recover(&self) -> Result<()> {
        for run in self.store.list_subagent_runs_by_status(SubagentStatus::Running).await? {
            warn!(run_id = %run.run_id, "recovering in-flight subagent run after restart");
            let mut recovered = run.clone();
            recovered.status = SubagentStatus::Queued;
            self.store.put_subagent_run(recovered).await?;
            self.append_event(&run.run_id, "recovered_after_restart", json!({})).await?;
            self.enqueue_run_id(&run.run_id).await.ok();
        }
        for run in self.store.list_subagent_runs_by_status(SubagentStatus::Queued).await? {
            self.enqueue_run_id(&run.run_id).await.ok();
        }
        Ok(())
    }

    pub async fn enqueue(&self, req: SubagentRequest) -> Result<SubagentRun> {
        if req.task.trim().is_empty() {
            return Err(SubagentError::InvalidArgument("task must not be empty".into()));
        }
        if req.depth > self.config.max_depth {
            return Err(SubagentError::DepthExceeded {
                depth: req.depth,
                max_depth: self.config.max_depth,
            });
        }

        let run = SubagentRun {
            run_id: self.store.next_id(),
            parent_session_id: req.parent_session_id,
            depth: req.depth,
            task: req.task,
            status: SubagentStatus::Queued,
            attempt: 0,
            max_attempts: self.config.max_attempts,
            timeout_sec: req.timeout_sec.unwrap_or(self.config.default_timeout_secs as f64),
            notify_on_complete: req.notify_on_complete.unwrap_or(self.config.notify_on_complete),
            queued_at: Store::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };
        self.store.put_subagent_run(run.clone()).await?;
        self.append_event(&run.run_id, "queued", json!({})).await?;
        self.telemetry.subagent_queued();

        // A full queue is not rolled back: the persisted run stays `queued`
        // and `start()`'s recovery sweep will pick it up on the next restart
        // (or an operator can nudge it with a manual requeue).
        self.enqueue_run_id(&run.run_id).await?;
        Ok(run)
    }

    async fn enqueue_run_id(&self, run_id: &str) -> Result<()> {
        match self.tx.try_send(run_id.to_string()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.telemetry.subagent_queue_full();
                Err(SubagentError::QueueFull(self.config.max_queue))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(SubagentError::Internal(anyhow::anyhow!("subagent dispatch channel closed")))
            }
        }
    }

    /// Request cancellation. Marks the run `Cancelled` immediately; a worker
    /// currently executing it observes the same signal via its cancel
    /// watcher and stops at the next poll.
    pub async fn cancel(&self, run_id: &str, reason: Option<String>) -> Result<()> {
        self.store
            .request_cancel(CancelSignal {
                run_id: run_id.to_string(),
                requested_at: Store::now(),
                reason: reason.clone(),
            })
            .await?;

        let Some(mut run) = self.store.get_subagent_run(run_id).await? else {
            return Err(SubagentError::NotFound(run_id.to_string()));
        };
        if !is_terminal(run.status) {
            run.status = SubagentStatus::Cancelled;
            run.finished_at = Some(Store::now());
            run.error = Some(reason.clone().unwrap_or_else(|| "cancelled".to_string()));
            self.store.put_subagent_run(run).await?;
            self.append_event(run_id, "cancel_requested", json!({"reason": reason})).await?;
        }
        Ok(())
    }

    /// Poll (≤200ms cadence) until every run in `run_ids` reaches a terminal
    /// status or `timeout` elapses.
    pub async fn wait(&self, run_ids: &[String], timeout: Duration) -> Result<Vec<SubagentRun>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut runs = Vec::with_capacity(run_ids.len());
            let mut all_terminal = true;
            for id in run_ids {
                let run = self
                    .store
                    .get_subagent_run(id)
                    .await?
                    .ok_or_else(|| SubagentError::NotFound(id.clone()))?;
                if !is_terminal(run.status) {
                    all_terminal = false;
                }
                runs.push(run);
            }
            if all_terminal || tokio::time::Instant::now() >= deadline {
                return Ok(runs);
            }
            tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
        }
    }

    async fn append_event(&self, run_id: &str, kind: &str, detail: serde_json::Value) -> Result<()> {
        self.store
            .put_subagent_event(SubagentEvent {
                id: self.store.next_id(),
                run_id: run_id.to_string(),
                seq: 0,
                kind: kind.to_string(),
                detail,
                created_at: Store::now(),
            })
            .await?;
        Ok(())
    }

    async fn execute_run(self: &Arc<Self>, run_id: String) {
        let Ok(Some(mut run)) = self.store.get_subagent_run(&run_id).await else {
            return;
        };
        if is_terminal(run.status) {
            return;
        }
        if matches!(self.store.take_cancel(&run_id).await, Ok(Some(_))) {
            self.finalize(run, SubagentStatus::Cancelled, None, Some("cancelled before start".into())).await;
            self.telemetry.subagent_cancelled();
            return;
        }

        let max_attempts = run.max_attempts.max(1);

        loop {
            run.attempt += 1;
            run.status = SubagentStatus::Running;
            run.started_at = Some(Store::now());
            let _ = self.store.put_subagent_run(run.clone()).await;
            self.append_event(&run.run_id, "running", json!({"attempt": run.attempt})).await.ok();

            match self.run_one_attempt(&run).await {
                Attempt::Succeeded(text) => {
                    self.finalize(run, SubagentStatus::Succeeded, Some(text), None).await;
                    self.telemetry.subagent_succeeded();
                    return;
                }
                Attempt::Cancelled => {
                    self.finalize(run, SubagentStatus::Cancelled, None, Some("cancelled".into())).await;
                    self.telemetry.subagent_cancelled();
                    return;
                }
                Attempt::TimedOut => {
                    if run.attempt < max_attempts {
                        self.telemetry.subagent_retries();
                        let message = format!("retry scheduled after timeout (attempt {} of {})", run.attempt, max_attempts);
                        self.append_event(&run.run_id, "retrying_after_timeout", json!({"message": message}))
                            .await
                            .ok();
                        tokio::time::sleep(Duration::from_secs(self.config.retry_backoff_secs)).await;
                        continue;
                    }
                    self.finalize(run, SubagentStatus::TimedOut, None, Some("execution timed out".into())).await;
                    self.telemetry.subagent_timed_out();
                    return;
                }
                Attempt::Failed(err) => {
                    if run.attempt < max_attempts {
                        self.telemetry.subagent_retries();
                        let message =
                            format!("retry scheduled after failure (attempt {} of {}): {}", run.attempt, max_attempts, err);
                        self.append_event(&run.run_id, "retrying", json!({"message": message, "error": err}))
                            .await
                            .ok();
                        tokio::time::sleep(Duration::from_secs(self.config.retry_backoff_secs)).await;
                        continue;
                    }
                    self.finalize(run, SubagentStatus::Failed, None, Some(err)).await;
                    self.telemetry.subagent_failed();
                    return;
                }
            }
        }
    }

    async fn run_one_attempt(&self, run: &SubagentRun) -> Attempt {
        let timeout = Duration::from_secs_f64(run.timeout_sec.max(0.0));
        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
        let store = self.store.clone();
        let run_id = run.run_id.clone();
        let watcher = tokio::spawn(async move {
            loop {
                tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
                if matches!(store.take_cancel(&run_id).await, Ok(Some(_))) {
                    let _ = cancel_tx.send(());
                    return;
                }
            }
        });

        let outcome = tokio::select! {
            result = tokio::time::timeout(timeout, self.executor.run(run)) => match result {
                Ok(Ok(text)) => Attempt::Succeeded(text),
                Ok(Err(e)) => Attempt::Failed(e.to_string()),
                Err(_elapsed) => Attempt::TimedOut,
            },
            _ = cancel_rx => Attempt::Cancelled,
        };
        watcher.abort();
        outcome
    }

    async fn finalize(&self, mut run: SubagentRun, status: SubagentStatus, result: Option<String>, error: Option<String>) {
        run.status = status;
        run.finished_at = Some(Store::now());
        run.result = result;
        run.error = error;
        let _ = self.store.put_subagent_run(run.clone()).await;
        let kind = match status {
            SubagentStatus::Succeeded => "succeeded",
            SubagentStatus::Failed => "failed",
            SubagentStatus::Cancelled => "cancelled",
            SubagentStatus::TimedOut => "timed_out",
            _ => "finished",
        };
        self.append_event(&run.run_id, kind, json!({})).await.ok();

        if run.notify_on_complete {
            if let Some(notifier) = &self.notifier {
                notifier.notify(&run.parent_session_id, &run).await;
            }
        }
    }
}

enum Attempt {
    Succeeded(String),
    Failed(String),
    TimedOut,
    Cancelled,
}

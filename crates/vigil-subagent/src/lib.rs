// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Durable worker pool for background sub-agent runs: accept a task from a
//! tool call, persist it, execute with retries/timeouts across N workers,
//! support external cancellation, and recover in-flight work after restart.

mod error;
mod executor;
mod manager;

pub use error::{Result, SubagentError};
pub use executor::{Executor, SubagentNotifier};
pub use manager::{SubagentManager, SubagentRequest};
pub use vigil_store::{SubagentRun, SubagentStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use vigil_config::SubagentConfig;
    use vigil_store::Store;
    use vigil_telemetry::Telemetry;

    struct EchoExecutor;
    #[async_trait]
    impl Executor for EchoExecutor {
        async fn run(&self, run: &SubagentRun) -> anyhow::Result<String> {
            Ok(format!("done: {}", run.task))
        }
    }

    struct FlakyExecutor {
        failures_left: AtomicUsize,
    }
    #[async_trait]
    impl Executor for FlakyExecutor {
        async fn run(&self, _run: &SubagentRun) -> anyhow::Result<String> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                anyhow::bail!("transient failure");
            }
            Ok("recovered".to_string())
        }
    }

    struct HangingExecutor;
    #[async_trait]
    impl Executor for HangingExecutor {
        async fn run(&self, _run: &SubagentRun) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    fn config() -> SubagentConfig {
        SubagentConfig {
            max_concurrent: 2,
            max_queue: 8,
            default_timeout_secs: 5,
            max_attempts: 2,
            retry_backoff_secs: 0,
            max_depth: 3,
            notify_on_complete: true,
        }
    }

    #[tokio::test]
    async fn a_run_is_executed_and_marked_succeeded() {
        let (store, _dir) = Store::open_temp().unwrap();
        let manager = SubagentManager::new(store.clone(), Arc::new(Telemetry::new()), config(), Arc::new(EchoExecutor), None);
        manager.start().await.unwrap();

        let run = manager
            .enqueue(SubagentRequest {
                parent_session_id: "s1".into(),
                depth: 0,
                task: "summarize the inbox".into(),
                timeout_sec: None,
                notify_on_complete: None,
            })
            .await
            .unwrap();

        let finished = manager.wait(&[run.run_id.clone()], Duration::from_secs(5)).await.unwrap();
        assert_eq!(finished[0].status, SubagentStatus::Succeeded);
        assert_eq!(finished[0].result.as_deref(), Some("done: summarize the inbox"));
    }

    #[tokio::test]
    async fn depth_beyond_max_is_rejected() {
        let (store, _dir) = Store::open_temp().unwrap();
        let manager = SubagentManager::new(store, Arc::new(Telemetry::new()), config(), Arc::new(EchoExecutor), None);
        manager.start().await.unwrap();

        let err = manager
            .enqueue(SubagentRequest {
                parent_session_id: "s1".into(),
                depth: 99,
                task: "too deep".into(),
                timeout_sec: None,
                notify_on_complete: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubagentError::DepthExceeded { .. }));
    }

    #[tokio::test]
    async fn a_failing_run_retries_then_succeeds() {
        let (store, _dir) = Store::open_temp().unwrap();
        let executor = Arc::new(FlakyExecutor { failures_left: AtomicUsize::new(1) });
        let manager = SubagentManager::new(store.clone(), Arc::new(Telemetry::new()), config(), executor, None);
        manager.start().await.unwrap();

        let run = manager
            .enqueue(SubagentRequest {
                parent_session_id: "s1".into(),
                depth: 0,
                task: "flaky task".into(),
                timeout_sec: None,
                notify_on_complete: None,
            })
            .await
            .unwrap();

        let finished = manager.wait(&[run.run_id.clone()], Duration::from_secs(5)).await.unwrap();
        assert_eq!(finished[0].status, SubagentStatus::Succeeded);
        assert_eq!(finished[0].attempt, 2);

        let events = store.list_subagent_events(&run.run_id, 100).await.unwrap();
        let retry_messages: Vec<&str> = events
            .iter()
            .filter_map(|e| e.detail.get("message").and_then(|v| v.as_str()))
            .filter(|m| m.starts_with("retry scheduled"))
            .collect();
        assert_eq!(retry_messages.len(), 1, "expected exactly one retry-scheduled event, got {events:?}");
    }

    #[tokio::test]
    async fn cancelling_a_running_task_finalizes_it_as_cancelled() {
        let mut cfg = config();
        cfg.default_timeout_secs = 3600;
        let (store, _dir) = Store::open_temp().unwrap();
        let manager = SubagentManager::new(store, Arc::new(Telemetry::new()), cfg, Arc::new(HangingExecutor), None);
        manager.start().await.unwrap();

        let run = manager
            .enqueue(SubagentRequest {
                parent_session_id: "s1".into(),
                depth: 0,
                task: "never finishes".into(),
                timeout_sec: None,
                notify_on_complete: None,
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.cancel(&run.run_id, Some("operator abort".into())).await.unwrap();

        let finished = manager.wait(&[run.run_id], Duration::from_secs(2)).await.unwrap();
        assert_eq!(finished[0].status, SubagentStatus::Cancelled);
    }
}

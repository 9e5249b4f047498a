// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Embedded, single-writer/many-reader durable state for Vigil.
//!
//! Every component that needs durability — the turn loop, the scheduler,
//! the subagent manager, the budget guard — holds a cheap `Store` handle and
//! talks to it through typed methods; there is no generic "run arbitrary
//! SQL" surface exposed outside this crate.

mod conn;
mod error;
mod records;
mod store;

pub use error::{Result, StoreError};
pub use records::*;
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(session_id: &str, store: &Store, role: &str, content: &str) -> Turn {
        Turn {
            id: store.next_id(),
            session_id: session_id.to_string(),
            seq: 0,
            role: role.to_string(),
            content: content.to_string(),
            token_count: Some(4),
            created_at: Store::now(),
        }
    }

    #[tokio::test]
    async fn append_and_window_turns_preserve_order() {
        let (store, _dir) = Store::open_temp().unwrap();
        for i in 0..5 {
            let t = turn("s1", &store, "user", &format!("message {i}"));
            store.append_turn(t).await.unwrap();
        }
        let window = store.window_turns("s1", 100).await.unwrap();
        assert_eq!(window.len(), 5);
        for (i, t) in window.iter().enumerate() {
            assert_eq!(t.content, format!("message {i}"));
        }
    }

    #[tokio::test]
    async fn window_limit_caps_and_does_not_cross_sessions() {
        let (store, _dir) = Store::open_temp().unwrap();
        for i in 0..3 {
            store.append_turn(turn("s1", &store, "user", &format!("a{i}"))).await.unwrap();
        }
        for i in 0..3 {
            store.append_turn(turn("s2", &store, "user", &format!("b{i}"))).await.unwrap();
        }
        let window = store.window_turns("s1", 2).await.unwrap();
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|t| t.session_id == "s1"));
    }

    #[tokio::test]
    async fn kv_put_get_delete_round_trip() {
        let (store, _dir) = Store::open_temp().unwrap();
        assert!(store.get_kv("missing").await.unwrap().is_none());
        store.put_kv("k", serde_json::json!({"n": 1})).await.unwrap();
        assert_eq!(store.get_kv("k").await.unwrap(), Some(serde_json::json!({"n": 1})));
        store.delete_kv("k").await.unwrap();
        assert!(store.get_kv("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subagent_run_status_filter_finds_recoverable_runs() {
        let (store, _dir) = Store::open_temp().unwrap();
        let mk = |id: &str, status: SubagentStatus| SubagentRun {
            run_id: id.to_string(),
            parent_session_id: "s1".to_string(),
            depth: 1,
            task: "do thing".to_string(),
            status,
            attempt: 1,
            max_attempts: 3,
            timeout_sec: 300.0,
            notify_on_complete: false,
            queued_at: Store::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };
        store.put_subagent_run(mk("r1", SubagentStatus::Queued)).await.unwrap();
        store.put_subagent_run(mk("r2", SubagentStatus::Running)).await.unwrap();
        store.put_subagent_run(mk("r3", SubagentStatus::Succeeded)).await.unwrap();

        let recoverable = store.list_subagent_runs_by_status(SubagentStatus::Queued).await.unwrap();
        assert_eq!(recoverable.len(), 1);
        assert_eq!(recoverable[0].run_id, "r1");

        let running = store.list_subagent_runs_by_status(SubagentStatus::Running).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].run_id, "r2");
    }

    #[tokio::test]
    async fn cancel_signal_is_consumed_exactly_once() {
        let (store, _dir) = Store::open_temp().unwrap();
        store
            .request_cancel(CancelSignal {
                run_id: "r1".to_string(),
                requested_at: Store::now(),
                reason: Some("user requested".to_string()),
            })
            .await
            .unwrap();

        let first = store.take_cancel("r1").await.unwrap();
        assert!(first.is_some());
        let second = store.take_cancel("r1").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn budget_reservation_lifecycle() {
        let (store, _dir) = Store::open_temp().unwrap();
        let res = BudgetReservation {
            id: store.next_id(),
            scope: "session:s1".to_string(),
            estimated_tokens: 500,
            created_at: Store::now(),
            expires_at: Store::now(),
        };
        store.put_budget_reservation(res.clone()).await.unwrap();
        assert_eq!(
            store.list_budget_reservations("session:s1").await.unwrap().len(),
            1
        );
        store.delete_budget_reservation(&res.scope, &res.id).await.unwrap();
        assert!(store.list_budget_reservations("session:s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mission_tasks_are_ordered_by_position_within_column() {
        let (store, _dir) = Store::open_temp().unwrap();
        let mk = |id: &str, pos: i64| MissionTask {
            id: id.to_string(),
            column_id: "todo".to_string(),
            title: id.to_string(),
            detail: None,
            position: pos,
            created_at: Store::now(),
            updated_at: Store::now(),
        };
        store.put_mission_task(mk("t2", 2)).await.unwrap();
        store.put_mission_task(mk("t1", 1)).await.unwrap();
        store.put_mission_task(mk("t3", 3)).await.unwrap();

        let tasks = store.list_mission_tasks("todo").await.unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn store_rejects_writes_after_close() {
        let (store, _dir) = Store::open_temp().unwrap();
        store.close();
        let err = store.put_kv("k", serde_json::json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }
}

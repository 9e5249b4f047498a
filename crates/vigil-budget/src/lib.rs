// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Reserve/commit/abort token budgeting across nested scopes
//! (`global`, `session:<id>`, `subagent:<run_id>`).

mod error;
mod guard;
mod settings;

pub use error::{BudgetError, Result};
pub use guard::{BudgetGuard, CommitOutcome, Preflight, Usage};
pub use settings::{BudgetMode, Settings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vigil_store::Store;
    use vigil_telemetry::Telemetry;

    fn guard_with(store: Store) -> BudgetGuard {
        BudgetGuard::new(store, Arc::new(Telemetry::new()))
    }

    #[tokio::test]
    async fn hard_block_rejects_over_limit_requests() {
        let (store, _dir) = Store::open_temp().unwrap();
        store
            .put_budget_counter(vigil_store::BudgetCounter {
                scope: "global".to_string(),
                window_start: Store::now(),
                used_tokens: 9,
                limit_tokens: 10,
            })
            .await
            .unwrap();

        let guard = guard_with(store.clone());
        let settings = Settings {
            hard_limit: 10,
            mode: BudgetMode::Hard,
            ..Default::default()
        };

        let err = guard
            .preflight(&settings, &["global".to_string()], 2)
            .await
            .unwrap_err();
        match err {
            BudgetError::LimitExceeded { scope, used, requested, limit, .. } => {
                assert_eq!(scope, "global");
                assert_eq!(used, 9);
                assert_eq!(requested, 2);
                assert_eq!(limit, 10);
            }
            other => panic!("expected LimitExceeded, got {other:?}"),
        }

        assert!(store.list_budget_reservations("global").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn preflight_commit_round_trip_keeps_reserved_non_negative() {
        let (store, _dir) = Store::open_temp().unwrap();
        let guard = guard_with(store.clone());
        let settings = Settings {
            hard_limit: 1000,
            mode: BudgetMode::Hybrid,
            ..Default::default()
        };

        let preflight = guard
            .preflight(&settings, &["global".to_string(), "session:s1".to_string()], 50)
            .await
            .unwrap();
        assert_eq!(preflight.reservations.len(), 2);

        for scope in ["global", "session:s1"] {
            let reserved: u64 = store
                .list_budget_reservations(scope)
                .await
                .unwrap()
                .iter()
                .map(|r| r.estimated_tokens)
                .sum();
            assert_eq!(reserved, 50);
        }

        guard
            .commit(
                &settings,
                &preflight,
                Usage {
                    total_tokens: Some(42),
                    output_chars: 0,
                },
            )
            .await
            .unwrap();

        for scope in ["global", "session:s1"] {
            assert!(store.list_budget_reservations(scope).await.unwrap().is_empty());
            let counter = store.get_budget_counter(scope).await.unwrap().unwrap();
            assert_eq!(counter.used_tokens, 42);
        }
    }

    #[tokio::test]
    async fn duplicate_scopes_are_deduplicated() {
        let (store, _dir) = Store::open_temp().unwrap();
        let guard = guard_with(store.clone());
        let settings = Settings::default();

        let preflight = guard
            .preflight(&settings, &["global".to_string(), "global".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(preflight.reservations.len(), 1);
    }

    #[tokio::test]
    async fn abort_releases_reservations_without_touching_usage() {
        let (store, _dir) = Store::open_temp().unwrap();
        let guard = guard_with(store.clone());
        let settings = Settings {
            hard_limit: 100,
            ..Default::default()
        };

        let preflight = guard.preflight(&settings, &["global".to_string()], 30).await.unwrap();
        guard.abort(&preflight).await;

        assert!(store.list_budget_reservations("global").await.unwrap().is_empty());
        assert!(store.get_budget_counter("global").await.unwrap().unwrap().used_tokens == 0);
    }

    #[tokio::test]
    async fn disabled_settings_skip_preflight_entirely() {
        let (store, _dir) = Store::open_temp().unwrap();
        let guard = guard_with(store.clone());
        let settings = Settings {
            enabled: false,
            hard_limit: 1,
            ..Default::default()
        };

        let preflight = guard
            .preflight(&settings, &["global".to_string()], 1_000_000)
            .await
            .unwrap();
        assert!(preflight.reservations.is_empty());
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `BudgetGuard`: reserve-commit-abort token accounting across nested
//! scopes, without holding any lock across a provider call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;
use tracing::warn;
use vigil_store::{BudgetCounter, BudgetReservation, Store};
use vigil_telemetry::Telemetry;

use crate::error::{BudgetError, Result};
use crate::settings::Settings;

/// Result of a successful `Preflight`: one reservation id per scope, plus
/// any soft warnings raised along the way.
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    pub reservations: HashMap<String, String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub warnings: Vec<String>,
    pub estimated_tokens: u64,
}

/// Actual (or to-be-estimated) usage reported after an LLM call.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub total_tokens: Option<u64>,
    pub output_chars: usize,
}

/// Enforces `Settings` across scopes backed by the Store's budget buckets.
/// A process-wide lock is only held for the duration of a single
/// `preflight`/`commit`/`abort` call — never across a provider/tool
/// invocation.
pub struct BudgetGuard {
    store: Store,
    telemetry: Arc<Telemetry>,
    lock: Mutex<()>,
}

impl BudgetGuard {
    pub fn new(store: Store, telemetry: Arc<Telemetry>) -> Self {
        Self {
            store,
            telemetry,
            lock: Mutex::new(()),
        }
    }

    pub async fn preflight(&self, settings: &Settings, scopes: &[String], planned_max_tokens: u64) -> Result<Preflight> {
        if !settings.enabled {
            self.telemetry.budget_preflight_bypassed();
            return Ok(Preflight::default());
        }

        let _guard = self.lock.lock().await;
        let mut deduped: Vec<&String> = Vec::new();
        for scope in scopes {
            if !deduped.contains(&scope) {
                deduped.push(scope);
            }
        }

        let mut created: Vec<(String, String, u64)> = Vec::new(); // (scope, reservation_id, tokens)
        let mut warnings = Vec::new();

        for scope in &deduped {
            let counter = self
                .store
                .get_budget_counter(scope)
                .await?
                .unwrap_or_else(|| BudgetCounter {
                    scope: scope.to_string(),
                    window_start: Store::now(),
                    used_tokens: 0,
                    limit_tokens: settings.hard_limit,
                });

            let reserved_now = reserved_for(&self.store, scope).await?;

            if settings.hard_limit > 0 && settings.blocks(scope) {
                let total_after = counter.used_tokens + reserved_now + planned_max_tokens;
                if total_after > settings.hard_limit {
                    self.abort_many(&created).await;
                    self.telemetry.budget_preflight_blocked();
                    return Err(BudgetError::LimitExceeded {
                        scope: scope.to_string(),
                        used: counter.used_tokens,
                        reserved: reserved_now,
                        requested: planned_max_tokens,
                        limit: settings.hard_limit,
                    });
                }
            }

            if settings.hard_limit > 0 {
                let total_after = counter.used_tokens + reserved_now + planned_max_tokens;
                if total_after * 100 >= settings.hard_limit * settings.soft_threshold_pct as u64 {
                    let msg = format!("scope {scope} is at {}% of its budget", total_after * 100 / settings.hard_limit);
                    warn!(scope = %scope, "{}", msg);
                    warnings.push(msg);
                    self.telemetry.budget_soft_warnings();
                }
            }

            let reservation = BudgetReservation {
                id: self.store.next_id(),
                scope: scope.to_string(),
                estimated_tokens: planned_max_tokens,
                created_at: Store::now(),
                expires_at: (Utc::now() + ChronoDuration::seconds(settings.reservation_ttl_secs)).to_rfc3339(),
            };
            self.store.put_budget_reservation(reservation.clone()).await?;
            self.store
                .put_budget_counter(BudgetCounter {
                    scope: scope.to_string(),
                    ..counter
                })
                .await?;
            created.push((scope.to_string(), reservation.id.clone(), planned_max_tokens));
        }

        self.telemetry.budget_preflight_ok();
        Ok(Preflight {
            reservations: created.into_iter().map(|(s, id, _)| (s, id)).collect(),
            warnings,
        })
    }

    pub async fn commit(&self, settings: &Settings, preflight: &Preflight, usage: Usage) -> Result<CommitOutcome> {
        let _guard = self.lock.lock().await;
        let actual = usage
            .total_tokens
            .unwrap_or_else(|| settings.estimate_tokens(usage.output_chars));

        let mut warnings = Vec::new();
        for (scope, reservation_id) in &preflight.reservations {
            let Some(reservation) = self.store.get_budget_reservation(scope, reservation_id).await? else {
                continue;
            };
            self.store.delete_budget_reservation(scope, reservation_id).await?;

            if let Some(mut counter) = self.store.get_budget_counter(scope).await? {
                counter.used_tokens += actual;
                self.store.put_budget_counter(counter).await?;
            } else {
                self.store
                    .put_budget_counter(BudgetCounter {
                        scope: scope.clone(),
                        window_start: Store::now(),
                        used_tokens: actual,
                        limit_tokens: settings.hard_limit,
                    })
                    .await?;
            }
            let _ = reservation.estimated_tokens;
        }

        if usage.total_tokens.is_none() {
            warnings.push(format!("estimated {actual} tokens from output length (no provider usage reported)"));
        }

        Ok(CommitOutcome {
            warnings,
            estimated_tokens: actual,
        })
    }

    pub async fn abort(&self, preflight: &Preflight) {
        let _guard = self.lock.lock().await;
        let items: Vec<(String, String, u64)> = preflight
            .reservations
            .iter()
            .map(|(s, id)| (s.clone(), id.clone(), 0))
            .collect();
        self.abort_many(&items).await;
    }

    async fn abort_many(&self, created: &[(String, String, u64)]) {
        for (scope, reservation_id, _) in created {
            let _ = self.store.delete_budget_reservation(scope, reservation_id).await;
        }
    }
}

async fn reserved_for(store: &Store, scope: &str) -> Result<u64> {
    let reservations = store.list_budget_reservations(scope).await?;
    Ok(reservations.iter().map(|r| r.estimated_tokens).sum())
}

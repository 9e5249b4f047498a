// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Engine-wide knobs derived from [`vigil_config::Config`].

use vigil_config::{BudgetConfig, BudgetMode as ConfigBudgetMode};

/// Settings the [`crate::Engine`] needs on every turn; cheap to clone into
/// each per-session handler.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub budget: vigil_budget::Settings,
    /// Upper bound on output tokens used to size a preflight reservation
    /// before the provider reports real usage.
    pub planned_max_tokens: u64,
    pub mailbox_capacity: usize,
    pub idle_ttl_secs: u64,
}

impl EngineSettings {
    pub fn from_config(config: &vigil_config::Config) -> Self {
        Self {
            budget: budget_settings_from(&config.budget),
            planned_max_tokens: config.model.max_tokens.unwrap_or(4096) as u64,
            mailbox_capacity: config.actor.mailbox_capacity,
            idle_ttl_secs: config.actor.idle_ttl_secs,
        }
    }
}

fn budget_settings_from(cfg: &BudgetConfig) -> vigil_budget::Settings {
    vigil_budget::Settings {
        enabled: cfg.enabled,
        mode: match cfg.mode {
            ConfigBudgetMode::Soft => vigil_budget::BudgetMode::Soft,
            ConfigBudgetMode::Hard => vigil_budget::BudgetMode::Hard,
            ConfigBudgetMode::Hybrid => vigil_budget::BudgetMode::Hybrid,
        },
        hard_limit: cfg.hard_limit,
        soft_threshold_pct: cfg.soft_threshold_pct,
        reservation_ttl_secs: cfg.reservation_ttl_secs,
        chars_per_token: cfg.chars_per_token,
    }
}

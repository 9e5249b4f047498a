// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// Warnings only, never blocks.
    Soft,
    /// Blocks at the hard limit in every scope.
    Hard,
    /// Blocks only at the `global` scope's hard limit; warns on per-scope
    /// soft thresholds otherwise.
    Hybrid,
}

/// The effective `TokenSafetyOverride` settings record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub enabled: bool,
    pub mode: BudgetMode,
    /// 0 means unlimited.
    pub hard_limit: u64,
    /// Percent (0-100) of `hard_limit` at which a soft warning fires.
    pub soft_threshold_pct: u8,
    pub reservation_ttl_secs: i64,
    /// Used to estimate tokens from output length when a provider reports
    /// no usage.
    pub chars_per_token: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: BudgetMode::Hybrid,
            hard_limit: 0,
            soft_threshold_pct: 90,
            reservation_ttl_secs: 300,
            chars_per_token: 4.0,
        }
    }
}

impl Settings {
    pub fn estimate_tokens(&self, output_chars: usize) -> u64 {
        (output_chars as f64 / self.chars_per_token).ceil() as u64
    }

    /// Whether this scope participates in hard blocking under the current
    /// mode. `Soft` never blocks; `Hard` blocks everywhere; `Hybrid` blocks
    /// only the `global` scope.
    pub fn blocks(&self, scope: &str) -> bool {
        match self.mode {
            BudgetMode::Soft => false,
            BudgetMode::Hard => true,
            BudgetMode::Hybrid => scope == "global",
        }
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Flat struct of atomic counters, snapshotted to a sorted map and rendered
//! as Prometheus text exposition. Never blocks, never returns an error —
//! telemetry must not be a reason a turn, a cron tick, or a subagent run
//! fails.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

macro_rules! counters {
    ($($field:ident => $name:literal),+ $(,)?) => {
        /// Process-wide counters. Every field is a monotonically increasing
        /// total except `_depth`/`_active`-suffixed gauges, which move in
        /// both directions.
        #[derive(Default)]
        pub struct Telemetry {
            $($field: AtomicU64,)+
            subagent_queue_depth: AtomicI64,
            active_actors: AtomicI64,
        }

        impl Telemetry {
            $(
                pub fn $field(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )+

            /// Snapshot every counter into a sorted map, ready for text
            /// exposition.
            pub fn snapshot(&self) -> BTreeMap<&'static str, i64> {
                let mut out = BTreeMap::new();
                $(out.insert($name, self.$field.load(Ordering::Relaxed) as i64);)+
                out.insert("subagent_queue_depth", self.subagent_queue_depth.load(Ordering::Relaxed));
                out.insert("active_actors", self.active_actors.load(Ordering::Relaxed));
                out
            }
        }
    };
}

counters! {
    turns_submitted => "turns_submitted",
    turns_succeeded => "turns_succeeded",
    turns_failed => "turns_failed",
    tool_calls => "tool_calls",
    tool_errors => "tool_errors",
    budget_preflight_ok => "budget_preflight_ok",
    budget_preflight_blocked => "budget_preflight_blocked",
    budget_preflight_bypassed => "budget_preflight_bypassed",
    budget_soft_warnings => "budget_soft_warnings",
    mailbox_full => "mailbox_full",
    subagent_queued => "subagent_queued",
    subagent_queue_full => "subagent_queue_full",
    subagent_succeeded => "subagent_succeeded",
    subagent_failed => "subagent_failed",
    subagent_timed_out => "subagent_timed_out",
    subagent_cancelled => "subagent_cancelled",
    subagent_retries => "subagent_retries",
    cron_ticks => "cron_ticks",
    cron_fires => "cron_fires",
    cron_errors => "cron_errors",
    heartbeat_ticks => "heartbeat_ticks",
    heartbeat_skipped_empty => "heartbeat_skipped_empty",
    heartbeat_runs => "heartbeat_runs",
    heartbeat_errors => "heartbeat_errors",
    gateway_requests => "gateway_requests",
    gateway_auth_failures => "gateway_auth_failures",
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subagent_queue_depth_set(&self, depth: i64) {
        self.subagent_queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn active_actors_inc(&self) {
        self.active_actors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_actors_dec(&self) {
        self.active_actors.fetch_sub(1, Ordering::Relaxed);
    }

    /// Render `Snapshot()` in the format the management API exposes:
    /// `# TYPE <metric> gauge\n<metric> <value>\n`, one pair per metric,
    /// alphabetically sorted (a `BTreeMap` snapshot is already sorted by
    /// key, so this just formats it).
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.snapshot() {
            out.push_str(&format!("# TYPE {name} gauge\n{name} {value}\n"));
        }
        out
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `GET /api/manage/overview` — a single-page operator summary: job count,
//! in-flight subagents, heartbeat status, telemetry snapshot.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::state::AppState;

#[derive(Serialize)]
pub struct Overview {
    pub jobs_total: usize,
    pub jobs_enabled: usize,
    pub subagents_queued: usize,
    pub subagents_running: usize,
    pub heartbeat_next_run_at: String,
    pub heartbeat_running: bool,
    pub telemetry: BTreeMap<&'static str, i64>,
}

pub async fn overview(State(state): State<AppState>) -> Result<Json<Overview>> {
    let jobs = state.cron.list(true).await?;
    let queued = state.store.list_subagent_runs_by_status(vigil_store::SubagentStatus::Queued).await?;
    let running = state.store.list_subagent_runs_by_status(vigil_store::SubagentStatus::Running).await?;

    Ok(Json(Overview {
        jobs_total: jobs.len(),
        jobs_enabled: jobs.iter().filter(|j| j.enabled).count(),
        subagents_queued: queued.len(),
        subagents_running: running.len(),
        heartbeat_next_run_at: state.heartbeat.next_run_at().await.to_rfc3339(),
        heartbeat_running: state.heartbeat.running().await,
        telemetry: state.telemetry.snapshot(),
    }))
}

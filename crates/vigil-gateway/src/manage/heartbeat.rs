// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/manage/heartbeat` — inspect recent ticks, trigger one manually, or
//! change the interval.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;
use vigil_store::HeartbeatRun;

#[derive(Serialize)]
pub struct HeartbeatStatus {
    pub running: bool,
    pub next_run_at: String,
    pub last_run: Option<HeartbeatRun>,
}

pub async fn status(State(state): State<AppState>) -> Json<HeartbeatStatus> {
    Json(HeartbeatStatus {
        running: state.heartbeat.running().await,
        next_run_at: state.heartbeat.next_run_at().await.to_rfc3339(),
        last_run: state.heartbeat.last_run().await,
    })
}

pub async fn history(State(state): State<AppState>) -> Result<Json<Vec<HeartbeatRun>>> {
    Ok(Json(state.store.list_heartbeat_runs(50).await?))
}

pub async fn trigger(State(state): State<AppState>) -> Result<Json<HeartbeatStatus>> {
    state.heartbeat.trigger_now().await.map_err(anyhow::Error::from)?;
    Ok(status(State(state)).await)
}

#[derive(Deserialize)]
pub struct SetIntervalRequest {
    pub interval_secs: u64,
}

pub async fn set_interval(State(state): State<AppState>, Json(req): Json<SetIntervalRequest>) -> Json<HeartbeatStatus> {
    state.heartbeat.set_interval(req.interval_secs).await;
    status(State(state)).await
}

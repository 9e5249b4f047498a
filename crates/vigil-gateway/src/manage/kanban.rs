// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/manage/kanban` — the mission board. No task-CRUD tool exists; this
//! is the only surface that mutates `MissionColumn`/`MissionTask` records.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::state::AppState;
use vigil_store::{MissionColumn, MissionPolicy, MissionTask, Store};

#[derive(Serialize)]
pub struct Board {
    pub columns: Vec<ColumnWithTasks>,
    pub policy: MissionPolicy,
}

#[derive(Serialize)]
pub struct ColumnWithTasks {
    #[serde(flatten)]
    pub column: MissionColumn,
    pub tasks: Vec<MissionTask>,
}

pub async fn get_board(State(state): State<AppState>) -> Result<Json<Board>> {
    let columns = state.store.list_mission_columns().await?;
    let mut out = Vec::with_capacity(columns.len());
    for column in columns {
        let tasks = state.store.list_mission_tasks(&column.id).await?;
        out.push(ColumnWithTasks { column, tasks });
    }
    let policy = state.store.get_mission_policy().await?.unwrap_or(MissionPolicy {
        default_column_id: None,
        wip_limits: Default::default(),
    });
    Ok(Json(Board { columns: out, policy }))
}

#[derive(Deserialize)]
pub struct PutColumnRequest {
    pub name: String,
    pub position: i64,
}

pub async fn put_column(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PutColumnRequest>,
) -> Result<Json<MissionColumn>> {
    if req.name.trim().is_empty() {
        return Err(GatewayError::InvalidArgument("column name must not be empty".into()));
    }
    let column = MissionColumn { id, name: req.name, position: req.position };
    state.store.put_mission_column(column.clone()).await?;
    Ok(Json(column))
}

#[derive(Deserialize)]
pub struct PutTaskRequest {
    pub column_id: String,
    pub title: String,
    pub detail: Option<String>,
    pub position: i64,
}

pub async fn put_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PutTaskRequest>,
) -> Result<Json<MissionTask>> {
    if req.title.trim().is_empty() {
        return Err(GatewayError::InvalidArgument("task title must not be empty".into()));
    }
    let existing = state.store.list_mission_tasks(&req.column_id).await?.into_iter().find(|t| t.id == id);
    let now = Store::now();
    let task = MissionTask {
        id,
        column_id: req.column_id,
        title: req.title,
        detail: req.detail,
        position: req.position,
        created_at: existing.map(|t| t.created_at).unwrap_or_else(|| now.clone()),
        updated_at: now,
    };
    state.store.put_mission_task(task.clone()).await?;
    Ok(Json(task))
}

pub async fn put_policy(State(state): State<AppState>, Json(policy): Json<MissionPolicy>) -> Result<Json<MissionPolicy>> {
    state.store.put_mission_policy(policy.clone()).await?;
    Ok(Json(policy))
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/manage/memory/*` — BM25 search and note CRUD over `vigil-memory`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use vigil_memory::{MemoryHit, MemoryNote};

use crate::error::Result;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

pub async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> Result<Json<Vec<MemoryHit>>> {
    Ok(Json(state.memory.search(&q.q, q.limit).await?))
}

pub async fn list_recent(State(state): State<AppState>) -> Result<Json<Vec<MemoryNote>>> {
    Ok(Json(state.memory.list_recent(50).await?))
}

pub async fn add(State(state): State<AppState>, Json(note): Json<MemoryNote>) -> Result<Json<MemoryNote>> {
    state.memory.add(note.clone()).await?;
    Ok(Json(note))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<axum::http::StatusCode> {
    state.memory.delete(&id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

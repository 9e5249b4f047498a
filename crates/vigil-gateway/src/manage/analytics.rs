// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/manage/analytics/*` — rolled-up daily token/request usage.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use vigil_store::UsageDaily;

use crate::error::Result;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UsageQuery {
    /// Restrict to a date prefix, e.g. `"2026-07"` for a whole month or
    /// `"2026-07-28"` for a single day. Empty returns every recorded day.
    #[serde(default)]
    pub date_prefix: String,
}

pub async fn usage(State(state): State<AppState>, Query(q): Query<UsageQuery>) -> Result<Json<Vec<UsageDaily>>> {
    Ok(Json(state.store.list_usage_daily(&q.date_prefix).await?))
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/manage/settings/*` — the operator-tunable budget enforcement
//! override (`soft`/`hard`/`hybrid`) for a scope, backed by
//! `TokenSafetyOverride`.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::error::{GatewayError, Result};
use crate::state::AppState;
use vigil_store::{Store, TokenSafetyOverride};

pub async fn get_budget_override(State(state): State<AppState>, Path(scope): Path<String>) -> Result<Json<Option<TokenSafetyOverride>>> {
    Ok(Json(state.store.get_token_safety_override(&scope).await?))
}

#[derive(Deserialize)]
pub struct SetBudgetOverrideRequest {
    pub mode: String,
    pub set_by: String,
}

pub async fn set_budget_override(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Json(req): Json<SetBudgetOverrideRequest>,
) -> Result<Json<TokenSafetyOverride>> {
    if !matches!(req.mode.as_str(), "soft" | "hard" | "hybrid") {
        return Err(GatewayError::InvalidArgument(format!("mode {:?} must be one of soft/hard/hybrid", req.mode)));
    }
    let override_ = TokenSafetyOverride { scope, mode: req.mode, set_at: Store::now(), set_by: req.set_by };
    state.store.put_token_safety_override(override_.clone()).await?;
    Ok(Json(override_))
}

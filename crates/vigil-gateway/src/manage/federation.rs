// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/manage/federation/*` — the allowlisted-peer registry. No
//! cross-host protocol exists (no cluster consensus, per the non-goals);
//! this is a read/list/add/remove surface an operator pre-populates for a
//! future federation feature to trust.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::error::{GatewayError, Result};
use crate::state::AppState;
use vigil_store::{FederationPeer, Store};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<FederationPeer>>> {
    Ok(Json(state.store.list_federation_peers().await?))
}

#[derive(Deserialize)]
pub struct AddPeerRequest {
    pub id: String,
    pub display_name: String,
}

pub async fn add(State(state): State<AppState>, Json(req): Json<AddPeerRequest>) -> Result<Json<FederationPeer>> {
    if req.id.trim().is_empty() {
        return Err(GatewayError::InvalidArgument("peer id must not be empty".into()));
    }
    let peer = FederationPeer { id: req.id, display_name: req.display_name, added_at: Store::now() };
    state.store.put_federation_peer(peer.clone()).await?;
    Ok(Json(peer))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<axum::http::StatusCode> {
    state.store.delete_federation_peer(&id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `GET /metrics` — Prometheus text exposition of `Telemetry::snapshot()`.
//! Unauthenticated: scrapers rarely carry a session cookie, and the values
//! exposed are aggregate counters, not secrets.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.telemetry.render_prometheus();
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/setup/*` (one-time onboarding) and `/api/auth/*` (session login).

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::auth;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SetupStatus {
    pub needs_setup: bool,
}

pub async fn setup_status(State(state): State<AppState>) -> Json<SetupStatus> {
    Json(SetupStatus { needs_setup: auth::needs_setup(&state).await })
}

#[derive(Deserialize)]
pub struct ClaimSetupRequest {
    pub setup_token: String,
    pub password: String,
}

pub async fn claim_setup(State(state): State<AppState>, Json(req): Json<ClaimSetupRequest>) -> Result<Response> {
    auth::claim_setup(&state, &req.setup_token, &req.password).await?;
    Ok((axum::http::StatusCode::NO_CONTENT, ()).into_response())
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Response> {
    let token = auth::login(&state, &req.password).await?;
    let cookie = auth::session_cookie_header(&token, state.config.session_cookie_ttl_secs);
    let mut response = (axum::http::StatusCode::NO_CONTENT, ()).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie.parse().expect("cookie header value is always valid ASCII"));
    Ok(response)
}

pub async fn logout(State(state): State<AppState>, req: axum::extract::Request) -> Response {
    if let Some(cookie) = req
        .headers()
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|c| c.split(';').map(str::trim).find_map(|p| p.strip_prefix("vigil_session=")))
    {
        auth::logout(&state, cookie).await;
    }
    let mut response = (axum::http::StatusCode::NO_CONTENT, ()).into_response();
    response
        .headers_mut()
        .insert(SET_COOKIE, auth::clear_cookie_header().parse().expect("cookie header value is always valid ASCII"));
    response
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Router assembly and server bootstrap for the management HTTP API.

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;

use crate::http::rate_limit::{new_login_limiter, rate_limit_mw};
use crate::http::{auth, security};
use crate::state::AppState;
use crate::{manage, metrics, setup};

/// Build the full router: unauthenticated onboarding/login/metrics, and the
/// session-cookie-guarded `/api/manage/*` surface.
pub fn build_router(state: AppState) -> Router {
    let login_limiter = new_login_limiter();

    let public = Router::new()
        .route("/api/setup/status", get(setup::setup_status))
        .route("/api/setup/claim", post(setup::claim_setup))
        .route("/api/auth/login", post(setup::login))
        .route("/api/auth/logout", post(setup::logout))
        .layer(middleware::from_fn_with_state(login_limiter, rate_limit_mw));

    let manage = Router::new()
        .route("/overview", get(manage::overview::overview))
        .route("/kanban", get(manage::kanban::get_board))
        .route("/kanban/columns/:id", put(manage::kanban::put_column))
        .route("/kanban/tasks/:id", put(manage::kanban::put_task))
        .route("/kanban/policy", put(manage::kanban::put_policy))
        .route("/heartbeat", get(manage::heartbeat::status))
        .route("/heartbeat/history", get(manage::heartbeat::history))
        .route("/heartbeat/trigger", post(manage::heartbeat::trigger))
        .route("/heartbeat/interval", put(manage::heartbeat::set_interval))
        .route("/memory/search", get(manage::memory::search))
        .route("/memory/recent", get(manage::memory::list_recent))
        .route("/memory", put(manage::memory::add))
        .route("/memory/:id", delete(manage::memory::delete))
        .route("/files", get(manage::files::read).put(manage::files::write))
        .route("/analytics/usage", get(manage::analytics::usage))
        .route("/settings/budget/:scope", get(manage::settings::get_budget_override).put(manage::settings::set_budget_override))
        .route("/federation", get(manage::federation::list).post(manage::federation::add))
        .route("/federation/:id", delete(manage::federation::remove))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::session_auth_mw));

    let metrics = Router::new().route("/metrics", get(metrics::metrics));

    Router::new()
        .merge(public)
        .nest("/api/manage", manage)
        .merge(metrics)
        .layer(middleware::from_fn(security::csrf_guard))
        .layer(middleware::from_fn(security::security_headers))
        .with_state(state)
}

/// Bind and serve forever. Returns only on a fatal I/O error.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr.clone();
    let router = build_router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "management API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

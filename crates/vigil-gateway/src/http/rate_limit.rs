// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! GCRA-based rate limiting for the unauthenticated onboarding/login
//! surface, so a password guesser can't hammer `/api/auth/login`.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use governor::{Quota, RateLimiter};

use crate::error::GatewayError;

pub type LoginLimiter = Arc<RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>;

/// Five attempts per minute, shared across all callers. Coarse on purpose —
/// this is a brake on automated guessing, not per-client fairness.
pub fn new_login_limiter() -> LoginLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(5).expect("5 is nonzero"));
    Arc::new(RateLimiter::direct(quota))
}

pub async fn rate_limit_mw(State(limiter): State<LoginLimiter>, req: Request, next: Next) -> Response {
    use axum::response::IntoResponse;
    if limiter.check().is_err() {
        return GatewayError::Conflict("too many attempts, slow down".into()).into_response();
    }
    next.run(req).await
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! One-time password+setup-token onboarding, then session-cookie auth for
//! every `/api/manage/*` request.

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{Duration as ChronoDuration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{GatewayError, Result};
use crate::state::{AppState, PendingToken};

pub const SESSION_COOKIE_NAME: &str = "vigil_session";

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Mint a setup token an operator must supply alongside a new password to
/// complete onboarding. Replaces any previously-issued, unclaimed token.
pub async fn issue_setup_token(state: &AppState) -> String {
    let token = random_token();
    let expires_at = Utc::now() + ChronoDuration::seconds(state.config.setup_token_ttl_secs);
    let mut auth = state.auth.lock().await;
    auth.pending_setup_token = Some(PendingToken { token: token.clone(), expires_at });
    token
}

pub async fn needs_setup(state: &AppState) -> bool {
    state.auth.lock().await.password_hash.is_none()
}

/// Claim a pending setup token and set the operator password, completing
/// onboarding. Fails if no token was issued, it expired, or it doesn't
/// match.
pub async fn claim_setup(state: &AppState, token: &str, password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(GatewayError::InvalidArgument("password must be at least 8 characters".into()));
    }
    let mut auth = state.auth.lock().await;
    let pending = auth.pending_setup_token.take().ok_or_else(|| GatewayError::Unauthorized)?;
    if Utc::now() > pending.expires_at {
        return Err(GatewayError::Unauthorized);
    }
    if !constant_time_eq(&pending.token, token) {
        auth.pending_setup_token = Some(pending);
        return Err(GatewayError::Unauthorized);
    }
    let salt = random_token();
    auth.password_hash = Some(format!("{salt}:{}", hash_password(password, &salt)));
    Ok(())
}

/// Verify `password` and mint a new session cookie value on success.
pub async fn login(state: &AppState, password: &str) -> Result<String> {
    let mut auth = state.auth.lock().await;
    let stored = auth.password_hash.clone().ok_or_else(|| GatewayError::Unauthorized)?;
    let (salt, expected_hash) = stored.split_once(':').ok_or_else(|| GatewayError::Unauthorized)?;
    let actual_hash = hash_password(password, salt);
    if !constant_time_eq(expected_hash, &actual_hash) {
        return Err(GatewayError::Unauthorized);
    }
    let token = random_token();
    let expires_at = Utc::now() + ChronoDuration::seconds(state.config.session_cookie_ttl_secs);
    auth.sessions.insert(token.clone(), expires_at);
    Ok(token)
}

pub async fn logout(state: &AppState, token: &str) {
    state.auth.lock().await.sessions.remove(token);
}

fn session_cookie_from_headers(req: &Request) -> Option<String> {
    req.headers()
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').map(str::trim).find_map(|pair| {
                pair.strip_prefix(&format!("{SESSION_COOKIE_NAME}="))
                    .map(str::to_string)
            })
        })
}

/// Build a `Set-Cookie` header value for a freshly minted session token.
pub fn session_cookie_header(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}")
}

pub fn clear_cookie_header() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0")
}

/// Rejects any `/api/manage/*` request without a live, unexpired session
/// cookie.
pub async fn session_auth_mw(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(token) = session_cookie_from_headers(&req) else {
        return GatewayError::Unauthorized.into_response();
    };
    let valid = {
        let mut auth = state.auth.lock().await;
        match auth.sessions.get(&token) {
            Some(expires_at) if *expires_at > Utc::now() => true,
            Some(_) => {
                auth.sessions.remove(&token);
                false
            }
            None => false,
        }
    };
    if !valid {
        return GatewayError::Unauthorized.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_salted_and_deterministic() {
        let a = hash_password("correct horse", "salt1");
        let b = hash_password("correct horse", "salt1");
        let c = hash_password("correct horse", "salt2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn constant_time_eq_matches_plain_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }

    #[test]
    fn cookie_header_has_expected_shape() {
        let header = session_cookie_header("tok", 3600);
        assert!(header.starts_with("vigil_session=tok;"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Max-Age=3600"));
    }
}

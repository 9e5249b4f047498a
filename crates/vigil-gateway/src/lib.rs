// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The management HTTP API: JSON over HTTP, session-cookie auth after a
//! one-time password+setup-token onboarding. See [`gateway::serve`] for the
//! server bootstrap and [`state::AppState`] for what it fronts.

mod error;
pub mod gateway;
mod http;
mod manage;
mod metrics;
mod setup;
pub mod state;

pub use error::{GatewayError, Result};
pub use gateway::{build_router, serve};
pub use http::auth;
pub use state::AppState;

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Maps the management API's error kinds onto the plain-text-body HTTP
//! taxonomy: `400|401|403|404|409|500`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<vigil_store::StoreError> for GatewayError {
    fn from(e: vigil_store::StoreError) -> Self {
        GatewayError::Internal(e.into())
    }
}

impl From<vigil_scheduler::SchedulerError> for GatewayError {
    fn from(e: vigil_scheduler::SchedulerError) -> Self {
        match e {
            vigil_scheduler::SchedulerError::InvalidArgument(msg) => GatewayError::InvalidArgument(msg),
            vigil_scheduler::SchedulerError::NotFound(msg) => GatewayError::NotFound(msg),
            other => GatewayError::Internal(other.into()),
        }
    }
}

impl From<vigil_subagent::SubagentError> for GatewayError {
    fn from(e: vigil_subagent::SubagentError) -> Self {
        use vigil_subagent::SubagentError;
        match e {
            SubagentError::InvalidArgument(msg) => GatewayError::InvalidArgument(msg),
            SubagentError::NotFound(id) => GatewayError::NotFound(format!("subagent run {id:?} not found")),
            SubagentError::DepthExceeded { depth, max_depth } => {
                GatewayError::InvalidArgument(format!("depth {depth} exceeds max depth {max_depth}"))
            }
            SubagentError::QueueFull(cap) => GatewayError::Conflict(format!("subagent queue is full (capacity {cap})")),
            SubagentError::Internal(e) => GatewayError::Internal(e),
        }
    }
}

impl From<vigil_memory::MemoryError> for GatewayError {
    fn from(e: vigil_memory::MemoryError) -> Self {
        match e {
            vigil_memory::MemoryError::InvalidArgument(msg) => GatewayError::InvalidArgument(msg),
            vigil_memory::MemoryError::NotFound(msg) => GatewayError::NotFound(msg),
            vigil_memory::MemoryError::Internal(e) => GatewayError::Internal(e),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self, "management API request failed");
        }
        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

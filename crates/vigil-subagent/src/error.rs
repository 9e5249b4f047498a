// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubagentError {
    #[error("task must not be empty")]
    InvalidArgument(String),
    #[error("subagent nesting depth {depth} exceeds max_depth {max_depth}")]
    DepthExceeded { depth: u32, max_depth: u32 },
    #[error("subagent queue is full (capacity {0})")]
    QueueFull(usize),
    #[error("run {0} not found")]
    NotFound(String),
    #[error("internal subagent failure: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<vigil_store::StoreError> for SubagentError {
    fn from(e: vigil_store::StoreError) -> Self {
        SubagentError::Internal(e.into())
    }
}

pub type Result<T> = std::result::Result<T, SubagentError>;

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("mailbox full for session {0}")]
    MailboxFull(String),
    #[error("budget limit exceeded in scope {scope}: used={used} reserved={reserved} requested={requested} limit={limit}")]
    LimitExceeded {
        scope: String,
        used: u64,
        reserved: u64,
        requested: u64,
        limit: u64,
    },
    #[error("turn cancelled")]
    Cancelled,
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("internal engine failure: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<vigil_actor::ActorError> for EngineError {
    fn from(e: vigil_actor::ActorError) -> Self {
        match e {
            vigil_actor::ActorError::MailboxFull(s) => EngineError::MailboxFull(s),
            other => EngineError::Internal(other.into()),
        }
    }
}

impl From<vigil_budget::BudgetError> for EngineError {
    fn from(e: vigil_budget::BudgetError) -> Self {
        match e {
            vigil_budget::BudgetError::LimitExceeded { scope, used, reserved, requested, limit } => {
                EngineError::LimitExceeded { scope, used, reserved, requested, limit }
            }
            other => EngineError::Internal(other.into()),
        }
    }
}

impl From<vigil_store::StoreError> for EngineError {
    fn from(e: vigil_store::StoreError) -> Self {
        EngineError::Internal(e.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

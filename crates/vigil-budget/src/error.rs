// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("budget limit exceeded in scope {scope}: used={used} reserved={reserved} requested={requested} limit={limit}")]
    LimitExceeded {
        scope: String,
        used: u64,
        reserved: u64,
        requested: u64,
        limit: u64,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal budget failure: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<vigil_store::StoreError> for BudgetError {
    fn from(e: vigil_store::StoreError) -> Self {
        BudgetError::Internal(e.into())
    }
}

pub type Result<T> = std::result::Result<T, BudgetError>;

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("note {0:?} not found")]
    NotFound(String),
    #[error("internal memory store failure: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

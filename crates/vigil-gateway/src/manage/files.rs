// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/manage/files` — read/write the workspace files the Engine's system
//! prompt and the heartbeat draw from (`AGENTS.md`, `SOUL.md`, `USER.md`,
//! `TOOLS.md`, the heartbeat file, ...). Writes are optimistic-concurrency
//! guarded by an ETag (the file's content hash) to satisfy the `CONFLICT`
//! error kind named in the error taxonomy.

use std::path::{Path, PathBuf};

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{GatewayError, Result};
use crate::state::AppState;

fn etag_of(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve `relative` against the workspace root, rejecting any path that
/// would escape it.
fn resolve(workspace_root: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() || candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(GatewayError::InvalidArgument(format!("path {relative:?} is not a valid workspace-relative path")));
    }
    Ok(workspace_root.join(candidate))
}

#[derive(Deserialize)]
pub struct FileQuery {
    pub path: String,
}

#[derive(Serialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub etag: String,
}

pub async fn read(State(state): State<AppState>, Query(q): Query<FileQuery>) -> Result<Json<FileContent>> {
    let full_path = resolve(&state.workspace_root, &q.path)?;
    let content = tokio::fs::read_to_string(&full_path)
        .await
        .map_err(|_| GatewayError::NotFound(format!("file {:?} not found", q.path)))?;
    let etag = etag_of(&content);
    Ok(Json(FileContent { path: q.path, content, etag }))
}

#[derive(Deserialize)]
pub struct WriteFileRequest {
    pub path: String,
    pub content: String,
    /// ETag of the version being replaced; `None` only permitted when the
    /// file does not exist yet.
    pub if_match: Option<String>,
}

pub async fn write(State(state): State<AppState>, Json(req): Json<WriteFileRequest>) -> Result<Json<FileContent>> {
    let full_path = resolve(&state.workspace_root, &req.path)?;
    let existing = tokio::fs::read_to_string(&full_path).await.ok();

    match (&existing, &req.if_match) {
        (Some(current), Some(expected)) if etag_of(current) != *expected => {
            return Err(GatewayError::Conflict(format!("file {:?} was modified since the given etag", req.path)));
        }
        (Some(_), None) => {
            return Err(GatewayError::Conflict(format!("file {:?} already exists; supply if_match", req.path)));
        }
        _ => {}
    }

    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| GatewayError::Internal(e.into()))?;
    }
    tokio::fs::write(&full_path, &req.content).await.map_err(|e| GatewayError::Internal(e.into()))?;
    let etag = etag_of(&req.content);
    Ok(Json(FileContent { path: req.path, content: req.content, etag }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_parent_dir_components() {
        let err = resolve(Path::new("/workspace"), "../etc/passwd").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
    }

    #[test]
    fn resolve_rejects_absolute_paths() {
        let err = resolve(Path::new("/workspace"), "/etc/passwd").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
    }

    #[test]
    fn resolve_accepts_plain_relative_path() {
        let resolved = resolve(Path::new("/workspace"), "AGENTS.md").unwrap();
        assert_eq!(resolved, PathBuf::from("/workspace/AGENTS.md"));
    }

    #[test]
    fn etag_changes_with_content() {
        assert_ne!(etag_of("a"), etag_of("b"));
        assert_eq!(etag_of("a"), etag_of("a"));
    }
}

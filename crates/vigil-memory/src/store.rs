// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `MemoryStore`: a small FTS5-backed note store used for semantic recall
//! across sessions.
//!
//! Grounded on the same bundled-SQLite + single-connection-behind-a-mutex
//! discipline `vigil-store` uses for the main operational store, but scaled
//! down: memory writes are rare (an agent calling an `update_memory`-style
//! tool, or an operator adding a note through the management API) compared
//! to the turn/tool-event volume the main store absorbs, so one connection
//! guarded by a mutex — rather than a dedicated writer thread plus a reader
//! pool — is adequate here and keeps the crate self-contained.
//!
//! Ranking is BM25 via SQLite FTS5's native `rank` column, which is already
//! what `content`/`tags` full-text search needs; no separate vector-index
//! crate is pulled in (`reqwest` remains in `Cargo.toml` for a future
//! embeddings backend, but the shipped implementation is BM25-only).

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{MemoryError, Result};
use crate::note::{MemoryHit, MemoryNote};

#[derive(Clone)]
pub struct MemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl MemoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MemoryError::Internal(e.into()))?;
            }
        }
        let conn = Connection::open(path).map_err(|e| MemoryError::Internal(e.into()))?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(|e| MemoryError::Internal(e.into()))?;
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn open_temp() -> Result<(Self, tempfile::TempDir)> {
        let dir = tempfile::tempdir().map_err(|e| MemoryError::Internal(e.into()))?;
        let store = Self::open(&dir.path().join("memory.sqlite3"))?;
        Ok((store, dir))
    }

    /// Persist a note (insert, or overwrite if `note.id` already exists).
    pub async fn add(&self, note: MemoryNote) -> Result<()> {
        if note.content.trim().is_empty() {
            return Err(MemoryError::InvalidArgument("note content must not be empty".into()));
        }
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute("DELETE FROM memory_notes WHERE id = ?1", params![note.id])?;
            conn.execute(
                "INSERT INTO memory_notes (id, session_id, content, tags, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![note.id, note.session_id, note.content, tags_to_text(&note.tags), note.created_at],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .map_err(|e| MemoryError::Internal(e.into()))?
        .map_err(|e| MemoryError::Internal(e.into()))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let deleted = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let n = conn.execute("DELETE FROM memory_notes WHERE id = ?1", params![id])?;
            Ok::<_, rusqlite::Error>(n)
        })
        .await
        .map_err(|e| MemoryError::Internal(e.into()))?
        .map_err(|e| MemoryError::Internal(e.into()))?;
        if deleted == 0 {
            return Err(MemoryError::NotFound(id));
        }
        Ok(())
    }

    /// BM25 full-text search over `content`/`tags`, most relevant first.
    /// An empty or whitespace-only query is rejected rather than silently
    /// matching everything.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryHit>> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(MemoryError::InvalidArgument("search query must not be empty".into()));
        }
        let fts_query = fts_phrase(&query);
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT n.id, n.session_id, n.content, n.tags, n.created_at, bm25(f) AS rank
                 FROM memory_fts f
                 JOIN memory_notes n ON n.rowid = f.rowid
                 WHERE memory_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![fts_query, limit as i64], |row| {
                Ok(MemoryHit {
                    note: MemoryNote {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        content: row.get(2)?,
                        tags: tags_from_text(&row.get::<_, String>(3)?),
                        created_at: row.get(4)?,
                    },
                    rank: row.get(5)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(|e| MemoryError::Internal(e.into()))?
        .map_err(|e| MemoryError::Internal(e.into()))
    }

    pub async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryNote>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, session_id, content, tags, created_at FROM memory_notes
                 ORDER BY created_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(MemoryNote {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    content: row.get(2)?,
                    tags: tags_from_text(&row.get::<_, String>(3)?),
                    created_at: row.get(4)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(|e| MemoryError::Internal(e.into()))?
        .map_err(|e| MemoryError::Internal(e.into()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<MemoryNote>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT id, session_id, content, tags, created_at FROM memory_notes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(MemoryNote {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        content: row.get(2)?,
                        tags: tags_from_text(&row.get::<_, String>(3)?),
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(|e| MemoryError::Internal(e.into()))?
        .map_err(|e| MemoryError::Internal(e.into()))
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memory_notes (
            id TEXT PRIMARY KEY,
            session_id TEXT,
            content TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
         );
         CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
            content, tags, content='memory_notes', content_rowid='rowid'
         );
         CREATE TRIGGER IF NOT EXISTS memory_notes_ai AFTER INSERT ON memory_notes BEGIN
            INSERT INTO memory_fts(rowid, content, tags) VALUES (new.rowid, new.content, new.tags);
         END;
         CREATE TRIGGER IF NOT EXISTS memory_notes_ad AFTER DELETE ON memory_notes BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, content, tags) VALUES ('delete', old.rowid, old.content, old.tags);
         END;
         CREATE TRIGGER IF NOT EXISTS memory_notes_au AFTER UPDATE ON memory_notes BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, content, tags) VALUES ('delete', old.rowid, old.content, old.tags);
            INSERT INTO memory_fts(rowid, content, tags) VALUES (new.rowid, new.content, new.tags);
         END;",
    )
    .map_err(|e| MemoryError::Internal(e.into()))
}

fn tags_to_text(tags: &[String]) -> String {
    tags.join(" ")
}

fn tags_from_text(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).filter(|s| !s.is_empty()).collect()
}

/// Wrap a raw query string as a single FTS5 phrase so punctuation and
/// reserved characters (`-`, `"`, `*`) in user input can never be parsed as
/// query syntax.
fn fts_phrase(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, content: &str) -> MemoryNote {
        MemoryNote {
            id: id.to_string(),
            session_id: Some("s1".to_string()),
            content: content.to_string(),
            tags: vec!["personal".to_string()],
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn add_then_search_finds_the_note() {
        let (store, _dir) = MemoryStore::open_temp().unwrap();
        store.add(note("n1", "the user prefers dark mode in every app")).await.unwrap();
        store.add(note("n2", "the office coffee machine is broken again")).await.unwrap();

        let hits = store.search("dark mode", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note.id, "n1");
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (store, _dir) = MemoryStore::open_temp().unwrap();
        let err = store.search("   ", 10).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn delete_removes_note_and_its_fts_entry() {
        let (store, _dir) = MemoryStore::open_temp().unwrap();
        store.add(note("n1", "remember to water the plants")).await.unwrap();
        store.delete("n1").await.unwrap();

        assert!(store.get("n1").await.unwrap().is_none());
        let hits = store.search("plants", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_note_is_not_found() {
        let (store, _dir) = MemoryStore::open_temp().unwrap();
        let err = store.delete("missing").await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn overwriting_an_id_replaces_its_fts_entry() {
        let (store, _dir) = MemoryStore::open_temp().unwrap();
        store.add(note("n1", "likes tea")).await.unwrap();
        store.add(note("n1", "likes coffee")).await.unwrap();

        assert!(store.search("tea", 10).await.unwrap().is_empty());
        assert_eq!(store.search("coffee", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first() {
        let (store, _dir) = MemoryStore::open_temp().unwrap();
        let mut a = note("n1", "first note");
        a.created_at = "2026-01-01T00:00:00Z".into();
        let mut b = note("n2", "second note");
        b.created_at = "2026-02-01T00:00:00Z".into();
        store.add(a).await.unwrap();
        store.add(b).await.unwrap();

        let recent = store.list_recent(10).await.unwrap();
        assert_eq!(recent[0].id, "n2");
        assert_eq!(recent[1].id, "n1");
    }

    #[tokio::test]
    async fn query_with_special_characters_does_not_error() {
        let (store, _dir) = MemoryStore::open_temp().unwrap();
        store.add(note("n1", "say \"hello\" - world*")).await.unwrap();
        // Must not panic or return a syntax error even though the raw query
        // contains FTS5-reserved characters.
        let hits = store.search("hello - world*", 10).await.unwrap();
        let _ = hits;
    }
}

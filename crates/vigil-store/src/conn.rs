// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Single-writer / many-readers discipline over one SQLite file.
//!
//! A dedicated OS thread owns the one read-write [`rusqlite::Connection`] and
//! drains a job queue, running one transaction at a time (§4.1 of the spec:
//! "All writes pass through a single serialized queue"). Readers never touch
//! that connection; they check out a short-lived read-only connection from a
//! small pool, so concurrent `Window`/`List*` calls never block behind a
//! slow write and never block each other.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::mpsc as stdmpsc;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tokio::sync::oneshot;

type BoxedResult = Result<Box<dyn Any + Send>>;
type WriteFn = Box<dyn FnOnce(&Connection) -> BoxedResult + Send>;

struct WriteJob {
    f: WriteFn,
    done: oneshot::Sender<BoxedResult>,
}

/// Handle to the writer thread and a pool of read-only connections.
pub(crate) struct ConnPool {
    path: PathBuf,
    write_tx: stdmpsc::Sender<WriteJob>,
    readers: Mutex<Vec<Connection>>,
    closed: Arc<Mutex<bool>>,
}

const BUCKETS: &[&str] = &[
    "turns",
    "session_meta",
    "tool_events",
    "jobs",
    "job_runs",
    "subagent_runs",
    "subagent_events",
    "budget_counters",
    "budget_reservations",
    "budget_events",
    "token_safety_override",
    "heartbeat_runs",
    "mission_columns",
    "mission_tasks",
    "mission_policy",
    "actor_checkpoints",
    "usage_daily",
    "federation_peers",
    "kv",
    "schema_migrations",
];

const SCHEMA_VERSION: i64 = 1;

impl ConnPool {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating store directory {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening store file {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "OFF")?;
        create_buckets(&conn)?;
        write_schema_sentinel(&conn)?;

        let (write_tx, write_rx) = stdmpsc::channel::<WriteJob>();
        let closed = Arc::new(Mutex::new(false));

        std::thread::Builder::new()
            .name("vigil-store-writer".into())
            .spawn(move || {
                while let Ok(job) = write_rx.recv() {
                    let result = (job.f)(&conn);
                    let _ = job.done.send(result);
                }
            })
            .context("spawning store writer thread")?;

        Ok(Self {
            path: path.to_path_buf(),
            write_tx,
            readers: Mutex::new(Vec::new()),
            closed,
        })
    }

    /// Submit a write closure to the single writer thread and await its result.
    pub(crate) async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        if *self.closed.lock().unwrap() {
            anyhow::bail!("store is closed");
        }
        let (done_tx, done_rx) = oneshot::channel();
        let job = WriteJob {
            f: Box::new(move |conn| f(conn).map(|v| Box::new(v) as Box<dyn Any + Send>)),
            done: done_tx,
        };
        self.write_tx
            .send(job)
            .map_err(|_| anyhow::anyhow!("store writer thread is gone"))?;
        let boxed = done_rx
            .await
            .map_err(|_| anyhow::anyhow!("store writer dropped the result channel"))??;
        Ok(*boxed
            .downcast::<T>()
            .map_err(|_| anyhow::anyhow!("store write result type mismatch"))?)
    }

    /// Run a read-only closure against a checked-out connection from the
    /// reader pool, on a blocking-pool thread so it never stalls the
    /// executor.
    pub(crate) async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let conn = self.checkout_reader(&path)?;
        let (result, conn) = tokio::task::spawn_blocking(move || {
            let result = f(&conn);
            (result, conn)
        })
        .await
        .context("reader task panicked")?;
        self.checkin_reader(conn);
        result
    }

    fn checkout_reader(&self, path: &Path) -> Result<Connection> {
        if let Some(conn) = self.readers.lock().unwrap().pop() {
            return Ok(conn);
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening reader connection to {}", path.display()))?;
        Ok(conn)
    }

    fn checkin_reader(&self, conn: Connection) {
        let mut pool = self.readers.lock().unwrap();
        if pool.len() < 8 {
            pool.push(conn);
        }
    }

    pub(crate) fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}

fn create_buckets(conn: &Connection) -> Result<()> {
    for bucket in BUCKETS {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {bucket} (key TEXT PRIMARY KEY, value TEXT NOT NULL)"
            ),
            [],
        )
        .with_context(|| format!("creating bucket {bucket}"))?;
    }
    Ok(())
}

fn write_schema_sentinel(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO NOTHING",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

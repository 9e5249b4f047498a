// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! One cooperative actor per session: a bounded mailbox, a dedicated task
//! that drains it strictly in arrival order, and idle-TTL eviction so the
//! registry doesn't grow without bound. Generalizes the single-session
//! serialization a coding-agent's in-process `Agent` gets for free into a
//! registry that can hold many concurrent sessions.

mod error;

pub use error::{ActorError, Result};

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Per-session handler. One instance is created per session by the
/// `ActorSystem`'s factory and lives for as long as the actor does.
#[async_trait]
pub trait Handler: Send + 'static {
    type Payload: Send + 'static;
    type Reply: Send + 'static;

    async fn handle(&mut self, payload: Self::Payload) -> Self::Reply;

    async fn on_start(&mut self) {}
    async fn on_stop(&mut self) {}
}

struct Envelope<H: Handler> {
    payload: H::Payload,
    reply: Option<oneshot::Sender<H::Reply>>,
}

struct ActorHandle<H: Handler> {
    mailbox: mpsc::Sender<Envelope<H>>,
    last_active_ms: Arc<AtomicI64>,
    task: tokio::task::JoinHandle<()>,
}

/// Registry of live per-session actors.
pub struct ActorSystem<H: Handler> {
    factory: Arc<dyn Fn(&str) -> H + Send + Sync>,
    actors: Mutex<HashMap<String, ActorHandle<H>>>,
    mailbox_capacity: usize,
    idle_ttl: Duration,
    started_at: Instant,
}

impl<H: Handler> ActorSystem<H> {
    pub fn new(factory: impl Fn(&str) -> H + Send + Sync + 'static) -> Self {
        Self::with_config(factory, 32, Duration::from_secs(600))
    }

    pub fn with_config(
        factory: impl Fn(&str) -> H + Send + Sync + 'static,
        mailbox_capacity: usize,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            factory: Arc::new(factory),
            actors: Mutex::new(HashMap::new()),
            mailbox_capacity,
            idle_ttl,
            started_at: Instant::now(),
        }
    }

    fn now_ms(&self) -> i64 {
        self.started_at.elapsed().as_millis() as i64
    }

    /// Submit `payload` to the actor for `session_id`, creating it on first
    /// use. Never blocks on a full mailbox — returns `MailboxFull`
    /// immediately instead. When `wait` is `true`, awaits the handler's
    /// reply (or the caller's own cancellation).
    pub async fn submit(&self, session_id: &str, payload: H::Payload, wait: bool) -> Result<Option<H::Reply>> {
        let mailbox = self.mailbox_for(session_id).await;

        let (reply_tx, reply_rx) = if wait {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let envelope = Envelope { payload, reply: reply_tx };
        mailbox
            .try_send(envelope)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ActorError::MailboxFull(session_id.to_string()),
                mpsc::error::TrySendError::Closed(_) => ActorError::Closed(session_id.to_string()),
            })?;

        match reply_rx {
            None => Ok(None),
            Some(rx) => match rx.await {
                Ok(reply) => Ok(Some(reply)),
                Err(_) => Err(ActorError::HandlerPanicked(session_id.to_string())),
            },
        }
    }

    async fn mailbox_for(&self, session_id: &str) -> mpsc::Sender<Envelope<H>> {
        let mut actors = self.actors.lock().await;
        if let Some(handle) = actors.get(session_id) {
            handle.last_active_ms.store(self.now_ms(), Ordering::Relaxed);
            return handle.mailbox.clone();
        }

        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let mut handler = (self.factory)(session_id);
        let last_active_ms = Arc::new(AtomicI64::new(self.now_ms()));
        let session = session_id.to_string();

        let task = tokio::spawn(async move {
            handler.on_start().await;
            let mut rx = rx;
            while let Some(envelope) = rx.recv().await {
                let result = AssertUnwindSafe(handler.handle(envelope.payload)).catch_unwind().await;
                match result {
                    Ok(reply) => {
                        if let Some(tx) = envelope.reply {
                            let _ = tx.send(reply);
                        }
                    }
                    Err(panic) => {
                        let msg = panic_message(&panic);
                        warn!(session_id = %session, "actor handler panicked: {}", msg);
                        // envelope.reply is dropped here; the waiting caller
                        // observes a closed channel and surfaces HandlerPanicked.
                    }
                }
            }
            handler.on_stop().await;
            debug!(session_id = %session, "actor stopped");
        });

        actors.insert(
            session_id.to_string(),
            ActorHandle {
                mailbox: tx.clone(),
                last_active_ms,
                task,
            },
        );
        tx
    }

    /// Evict actors that have had no traffic for `idle_ttl`: close the
    /// mailbox and wait for the actor task to drain it and finish (running
    /// `handler.on_stop()`), rather than aborting it mid-flight.
    pub async fn reap_idle(&self) {
        let now = self.now_ms();
        let idle_ms = self.idle_ttl.as_millis() as i64;
        let evicted: Vec<(String, ActorHandle<H>)> = {
            let mut actors = self.actors.lock().await;
            let idle: Vec<String> = actors
                .iter()
                .filter(|(_, h)| now - h.last_active_ms.load(Ordering::Relaxed) >= idle_ms)
                .map(|(k, _)| k.clone())
                .collect();
            idle.into_iter().filter_map(|id| actors.remove(&id).map(|h| (id, h))).collect()
        };
        for (session_id, handle) in evicted {
            // Dropping the only sender makes the actor's mailbox recv loop
            // observe `None` once it drains whatever was already queued, so
            // `on_stop` still runs before the task exits.
            drop(handle.mailbox);
            match handle.task.await {
                Ok(()) => debug!(session_id = %session_id, "evicted idle actor"),
                Err(e) => warn!(session_id = %session_id, "actor task join failed during eviction: {e}"),
            }
        }
    }

    pub async fn active_count(&self) -> usize {
        self.actors.lock().await.len()
    }

    /// Run the reaper loop until cancelled. Intended to be spawned once per
    /// `ActorSystem` by the runtime.
    pub async fn run_reaper(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.reap_idle().await;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! A single 1s ticker that fires jobs whose `next_run_at` has arrived.
//! Handlers run inline on the ticker task — a slow job delays the next one,
//! by design, to keep cron work serialized within the process. Per-session
//! serialization for the actual turn still happens through the Engine's
//! actor for the synthetic session `cron:<job_id>`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use vigil_engine::{Engine, InboundMessage};
use vigil_store::{Job, JobRun, JobRunStatus, Store};
use vigil_telemetry::Telemetry;

use crate::error::{Result, SchedulerError};
use crate::schedule::Schedule;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct CronService {
    store: Store,
    engine: Arc<Engine>,
    telemetry: Arc<Telemetry>,
}

impl CronService {
    pub fn new(store: Store, engine: Arc<Engine>, telemetry: Arc<Telemetry>) -> Arc<Self> {
        Arc::new(Self { store, engine, telemetry })
    }

    /// Spawn the ticker task. Returns its `JoinHandle`; dropping it does not
    /// stop the ticker (it runs for the lifetime of the process).
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = this.tick().await {
                    error!(error = %e, "cron tick failed");
                }
            }
        })
    }

    /// List all enabled jobs whose `next_run_at` has arrived and fire them,
    /// one at a time, inline.
    pub async fn tick(&self) -> Result<()> {
        self.telemetry.cron_ticks();
        let now = Utc::now();
        let due: Vec<Job> = self
            .store
            .list_jobs()
            .await?
            .into_iter()
            .filter(|j| j.enabled && due_now(j, now))
            .collect();

        for job in due {
            self.fire(job, now, false).await;
        }
        Ok(())
    }

    async fn fire(&self, mut job: Job, now: chrono::DateTime<Utc>, forced: bool) -> JobRun {
        self.telemetry.cron_fires();
        let run_id = self.store.next_id();
        let started_at = Store::now();

        let session_id = format!("cron:{}", job.id);
        let content = job
            .payload
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(cron trigger)")
            .to_string();

        let inbound = InboundMessage {
            session_id: session_id.clone(),
            request_id: self.store.next_id(),
            channel: "cron".to_string(),
            chat_id: job
                .payload
                .get("to")
                .and_then(|v| v.as_str())
                .unwrap_or(&session_id)
                .to_string(),
            sender_id: "cron".to_string(),
            content,
            media: Vec::new(),
            metadata: job.payload.clone(),
            created_at: started_at.clone(),
        };

        let (status, error) = match self.engine.ask(inbound).await {
            Ok(_) => (JobRunStatus::Succeeded, None),
            Err(e) => {
                self.telemetry.cron_errors();
                warn!(job_id = %job.id, error = %e, "cron job execution failed");
                (JobRunStatus::Failed, Some(e.to_string()))
            }
        };

        let run = JobRun {
            id: run_id,
            job_id: job.id.clone(),
            status,
            started_at: started_at.clone(),
            finished_at: Some(Store::now()),
            error: error.clone(),
        };
        let _ = self.store.put_job_run(run.clone()).await;

        job.last_run_at = Some(started_at);
        job.last_status = Some(match status {
            JobRunStatus::Succeeded => "ok".to_string(),
            JobRunStatus::Failed => "error".to_string(),
            JobRunStatus::Running | JobRunStatus::Skipped => "ok".to_string(),
        });
        job.last_error = error.clone();

        if !forced {
            self.advance(&mut job, now);
        }
        let _ = self.store.put_job(job).await;
        run
    }

    /// Recompute `next_run_at` (or disable) after a non-forced fire.
    fn advance(&self, job: &mut Job, now: chrono::DateTime<Utc>) {
        match Schedule::parse(&job.schedule).and_then(|s| s.next_fire_after(now)) {
            Ok(Some(next)) => job.next_run_at = Some(next.to_rfc3339()),
            Ok(None) => {
                job.next_run_at = None;
                job.enabled = false;
                info!(job_id = %job.id, "single-shot job fired; disabling");
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "could not compute next_run_at; disabling job");
                job.next_run_at = None;
                job.enabled = false;
            }
        }
    }

    pub async fn put(&self, mut job: Job) -> Result<Job> {
        if job.name.trim().is_empty() {
            return Err(SchedulerError::InvalidArgument("job name must not be empty".into()));
        }
        // Validate the schedule descriptor eagerly so bad JSON is rejected at
        // write time, not at the next tick.
        let schedule = Schedule::parse(&job.schedule)?;
        if job.next_run_at.is_none() {
            let now = Utc::now();
            job.next_run_at = schedule.next_fire_after(now)?.map(|d| d.to_rfc3339());
        }
        self.store.put_job(job.clone()).await?;
        Ok(job)
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.delete_job(id).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.store.get_job(id).await?)
    }

    pub async fn list(&self, include_disabled: bool) -> Result<Vec<Job>> {
        let jobs = self.store.list_jobs().await?;
        Ok(if include_disabled {
            jobs
        } else {
            jobs.into_iter().filter(|j| j.enabled).collect()
        })
    }

    pub async fn enable(&self, id: &str, enabled: bool) -> Result<Job> {
        let mut job = self
            .store
            .get_job(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        job.enabled = enabled;
        if enabled && job.next_run_at.is_none() {
            let schedule = Schedule::parse(&job.schedule)?;
            job.next_run_at = schedule.next_fire_after(Utc::now())?.map(|d| d.to_rfc3339());
        }
        self.store.put_job(job.clone()).await?;
        Ok(job)
    }

    /// `force=true` bypasses the `enabled` check (a disabled job can still be
    /// run on demand). `last_run_at`/`last_status`/`last_error` are updated
    /// like any other fire, but `next_run_at` is left untouched — a manual
    /// run is observational, not a replacement for the schedule's own cadence.
    pub async fn run_now(&self, id: &str, force: bool) -> Result<JobRun> {
        let job = self
            .store
            .get_job(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        if !job.enabled && !force {
            return Err(SchedulerError::InvalidArgument(format!("job {id} is disabled; pass force=true to run anyway")));
        }
        let now = Utc::now();
        Ok(self.fire(job, now, true).await)
    }
}

fn due_now(job: &Job, now: chrono::DateTime<Utc>) -> bool {
    match &job.next_run_at {
        Some(ts) => ts.parse::<chrono::DateTime<Utc>>().map(|t| t <= now).unwrap_or(false),
        None => false,
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The JSON descriptor stored in [`vigil_store::Job::schedule`], and the
//! pure next-fire-time computation for each schedule kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Single-shot: fires once at `at`, then the job is disabled.
    At { at: DateTime<Utc> },
    /// Fires every `every_ms` milliseconds, measured from the previous fire.
    Every { every_ms: i64 },
    /// Standard 5-field cron expression, minute precision. `tz` is currently
    /// advisory only — schedules are evaluated in UTC.
    Cron { expr: String, tz: Option<String> },
}

impl Schedule {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SchedulerError::InvalidArgument(format!("bad schedule json: {e}")))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Schedule always serializes")
    }

    /// Compute the next fire time strictly after `after`. `None` means the
    /// schedule is exhausted (an `at` job whose time has already passed) and
    /// the job should be disabled.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        match self {
            Schedule::At { at } => Ok((*at > after).then_some(*at)),
            Schedule::Every { every_ms } => Ok(Some(after + chrono::Duration::milliseconds(*every_ms))),
            Schedule::Cron { expr, .. } => {
                let normalized = normalize_cron_expr(expr);
                let parsed = cron::Schedule::from_str(&normalized)
                    .map_err(|e| SchedulerError::InvalidArgument(format!("bad cron expression {expr:?}: {e}")))?;
                Ok(parsed.after(&after).next())
            }
        }
    }
}

/// The `cron` crate expects a leading seconds field; the spec calls for a
/// standard 5-field expression at minute precision, so a bare 5-field
/// expression gets `0` prepended for seconds.
fn normalize_cron_expr(expr: &str) -> String {
    let fields = expr.split_whitespace().count();
    if fields == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn at_job_in_future_fires_at_its_time() {
        let now = t(2026, 1, 1, 0, 0, 0);
        let at = t(2026, 1, 1, 1, 0, 0);
        let sched = Schedule::At { at };
        assert_eq!(sched.next_fire_after(now).unwrap(), Some(at));
    }

    #[test]
    fn at_job_in_past_is_exhausted() {
        let now = t(2026, 1, 1, 1, 0, 0);
        let at = t(2026, 1, 1, 0, 0, 0);
        let sched = Schedule::At { at };
        assert_eq!(sched.next_fire_after(now).unwrap(), None);
    }

    #[test]
    fn every_job_adds_the_interval() {
        let now = t(2026, 1, 1, 0, 0, 0);
        let sched = Schedule::Every { every_ms: 10_000 };
        assert_eq!(sched.next_fire_after(now).unwrap(), Some(now + chrono::Duration::milliseconds(10_000)));
    }

    #[test]
    fn cron_job_computes_next_minute_boundary() {
        let now = t(2026, 1, 1, 0, 0, 30);
        // every minute
        let sched = Schedule::Cron { expr: "* * * * *".into(), tz: None };
        let next = sched.next_fire_after(now).unwrap().unwrap();
        assert_eq!(next, t(2026, 1, 1, 0, 1, 0));
    }

    #[test]
    fn bad_cron_expression_is_invalid_argument() {
        let sched = Schedule::Cron { expr: "not a cron expr".into(), tz: None };
        let err = sched.next_fire_after(Utc::now()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidArgument(_)));
    }

    #[test]
    fn round_trips_through_json() {
        let sched = Schedule::Every { every_ms: 5_000 };
        let json = sched.to_json();
        let back = Schedule::parse(&json).unwrap();
        assert_eq!(sched, back);
    }
}

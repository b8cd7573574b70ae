use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::schedule::{normalize_cron, parse_every};

/// Longest accepted `Interval`: one year.
pub const MAX_INTERVAL_SECS: u64 = 366 * 24 * 3_600;

/// Defines when and how often a job should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run exactly once at the given UTC instant.
    Once { at: DateTime<Utc> },

    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Run every day at the given hour and minute (UTC).
    Daily { hour: u8, minute: u8 },

    /// Run on a specific weekday (0 = Monday … 6 = Sunday) at the given time (UTC).
    Weekly { day: u8, hour: u8, minute: u8 },

    /// Run according to a cron expression, stored in 6-field form
    /// (`sec min hour day-of-month month day-of-week`).
    Cron { expression: String },
}

impl Schedule {
    /// Parse `@every <N>[s|m|h]` into an `Interval`, anything else as a
    /// 5- or 6-field cron expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if let Some(rest) = expr.strip_prefix("@every") {
            let every_secs = parse_every(rest.trim()).ok_or_else(|| {
                SchedulerError::InvalidSchedule(format!("bad @every duration: {expr}"))
            })?;
            let schedule = Schedule::Interval { every_secs };
            schedule.validate()?;
            return Ok(schedule);
        }
        let schedule = Schedule::Cron {
            expression: normalize_cron(expr),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Reject definitions that can never produce a run time.
    pub fn validate(&self) -> Result<()> {
        match self {
            Schedule::Once { .. } => Ok(()),
            Schedule::Interval { every_secs: 0 } => Err(SchedulerError::InvalidSchedule(
                "interval must be at least one second".to_string(),
            )),
            Schedule::Interval { every_secs } if *every_secs > MAX_INTERVAL_SECS => {
                Err(SchedulerError::InvalidSchedule(format!(
                    "interval of {every_secs}s exceeds the {MAX_INTERVAL_SECS}s maximum"
                )))
            }
            Schedule::Interval { .. } => Ok(()),
            Schedule::Daily { hour, minute } | Schedule::Weekly { hour, minute, .. }
                if *hour > 23 || *minute > 59 =>
            {
                Err(SchedulerError::InvalidSchedule(format!(
                    "time out of range: {hour:02}:{minute:02}"
                )))
            }
            Schedule::Weekly { day, .. } if *day > 6 => Err(SchedulerError::InvalidSchedule(
                format!("weekday out of range: {day}"),
            )),
            Schedule::Daily { .. } | Schedule::Weekly { .. } => Ok(()),
            Schedule::Cron { expression } => expression
                .parse::<cron::Schedule>()
                .map(|_| ())
                .map_err(|e| SchedulerError::InvalidSchedule(format!("{expression}: {e}"))),
        }
    }
}

/// Execution state of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next run (or for a manual trigger).
    Idle,
    /// A callback invocation is in flight.
    Running,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
        };
        write!(f, "{s}")
    }
}

/// Result of asking the scheduler to run a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// The callback ran and returned `Ok`.
    Completed,
    /// The callback returned an error or panicked.
    Failed { error: String },
    /// The job was already running; nothing was started.
    Skipped,
}

/// Result of deregistering a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    /// The job is mid-run; it is dropped as soon as that run finishes.
    Deferred,
}

/// Point-in-time snapshot of a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    /// Unique job name.
    pub name: String,
    pub schedule: Schedule,
    pub status: JobStatus,
    /// Finished runs, successful or not.
    pub run_count: u64,
    pub failure_count: u64,
    pub last_run: Option<DateTime<Utc>>,
    /// `None` once the schedule is exhausted (e.g. a `Once` job after firing).
    pub next_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub pending_removal: bool,
    pub created_at: DateTime<Utc>,
}

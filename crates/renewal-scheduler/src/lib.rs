//! `renewal-scheduler`: Tokio-based scheduler for named in-process jobs.
//!
//! # Overview
//!
//! Jobs are registered by name with a [`Schedule`] and an async callback.
//! [`Scheduler::start`] spawns a loop that polls at a fixed tick and runs
//! every due job; [`Scheduler::trigger_job`] runs one on demand. A job that
//! is already running is skipped by both paths, so at most one execution of
//! a given job is ever in flight.
//!
//! # Schedule variants
//!
//! | Variant    | Behaviour                                          |
//! |------------|----------------------------------------------------|
//! | `Once`     | Single fire at an absolute UTC instant             |
//! | `Interval` | Repeat every N seconds                             |
//! | `Daily`    | Fire at HH:MM UTC every day                        |
//! | `Weekly`   | Fire at HH:MM UTC on a specific weekday            |
//! | `Cron`     | 5- or 6-field cron expression                      |

pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::{JobCallback, JobError, JobResult, Scheduler};
pub use error::{Result, SchedulerError};
pub use types::{JobInfo, JobStatus, RemoveOutcome, Schedule, TriggerOutcome};

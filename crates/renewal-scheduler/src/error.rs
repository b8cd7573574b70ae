use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The provided schedule definition is invalid or unsupported.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No job is registered under the given name.
    #[error("Job not found: {name}")]
    JobNotFound { name: String },

    /// The poll interval must be non-zero.
    #[error("Scheduler tick must be greater than zero")]
    InvalidTick,

    /// The loop was started outside a Tokio runtime.
    #[error("No Tokio runtime available to run the scheduler loop")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

//! Reminder evaluation and the owner-facing command surface.
//!
//! [`ReminderEngine::evaluate`] is the periodic pass: it walks every tracked
//! resource, works out which interval reminders are due and delivers each at
//! most once. [`CommandService`] handles track / list / status / untrack and
//! always answers with text.

pub mod commands;
pub mod engine;
pub mod error;
pub mod report;

pub use commands::CommandService;
pub use engine::ReminderEngine;
pub use error::{EngineError, Result};
pub use report::EvaluationReport;

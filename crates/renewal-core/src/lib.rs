//! Shared vocabulary for the renewal workspace: configuration, the error
//! taxonomy, interval tags and the urgency tiers that drive reminder text.

pub mod config;
pub mod error;
pub mod reminder;
pub mod types;

pub use error::{RenewalError, Result};
pub use reminder::{days_until, render_reminder, render_status, Urgency};
pub use types::{IntervalTag, PostExpiryKey, ResourceName};

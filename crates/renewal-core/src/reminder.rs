//! Urgency tiers and reminder text, shared by the reminder engine and the
//! owner-facing commands.
//!
//! Rendering is a pure function of `(name, days_remaining)`. The wording can
//! change freely; the tier boundaries cannot, because they line up with the
//! interval tags used for delivery dedup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DAY_MS: i64 = 86_400_000;

/// Whole days until `expiry`, rounded up: anything left today counts as a day.
///
/// `ceil((expiry - now) / 1 day)`; zero or negative once the instant has passed.
pub fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = expiry.signed_duration_since(now).num_milliseconds();
    -(-ms).div_euclid(DAY_MS)
}

/// Urgency tier derived from days remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// `days <= 0`
    Expired,
    /// `days == 1`
    DueTomorrow,
    /// `2..=7`
    DueThisWeek,
    /// `8..=30`
    DueThisMonth,
    /// `> 30`
    Later,
}

impl Urgency {
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d <= 0 => Urgency::Expired,
            1 => Urgency::DueTomorrow,
            2..=7 => Urgency::DueThisWeek,
            8..=30 => Urgency::DueThisMonth,
            _ => Urgency::Later,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Expired => "expired",
            Urgency::DueTomorrow => "expires tomorrow",
            Urgency::DueThisWeek => "expires within a week",
            Urgency::DueThisMonth => "expires within a month",
            Urgency::Later => "active",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Reminder text sent to an owner.
pub fn render_reminder(name: &str, days: i64) -> String {
    match Urgency::from_days(days) {
        Urgency::Expired if days == 0 => format!(
            "🚨 URGENT: {name} has expired! Renew it now before someone else registers it."
        ),
        Urgency::Expired => format!(
            "🚨 URGENT: {name} expired {} ago! Renew it now before someone else registers it.",
            plural_days(-days)
        ),
        Urgency::DueTomorrow => format!(
            "⏰ Final reminder: {name} expires tomorrow (1 day left). Renew today to keep it."
        ),
        Urgency::DueThisWeek => format!(
            "⚠️ Reminder: {name} expires in {}. Renew soon to avoid losing it.",
            plural_days(days)
        ),
        Urgency::DueThisMonth => {
            format!("📅 Heads up: {name} expires in {}.", plural_days(days))
        }
        Urgency::Later => format!(
            "{name} expires in {}. No action needed yet.",
            plural_days(days)
        ),
    }
}

/// One-line status used by the list and status commands.
pub fn render_status(name: &str, expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(expiry) = expiry else {
        return format!("{name}: expiry date unknown");
    };
    let days = days_until(expiry, now);
    let date = expiry.format("%Y-%m-%d");
    match Urgency::from_days(days) {
        Urgency::Expired => format!("{name}: expired on {date}"),
        Urgency::DueTomorrow => format!("{name}: expires tomorrow ({date})"),
        tier => format!("{name}: {}, {} left (expires {date})", tier, plural_days(days)),
    }
}

fn plural_days(n: i64) -> String {
    if n == 1 {
        "1 day".to_string()
    } else {
        format!("{n} days")
    }
}

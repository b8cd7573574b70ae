use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::warn;

use crate::types::Schedule;

/// Compute the next UTC execution time for `schedule` relative to `from`.
///
/// `Once` fires at its instant if that is not before `from`; the recurring
/// variants return the first slot strictly after `from`. Returns `None` when
/// the schedule is exhausted or cannot be evaluated.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => (*at >= from).then_some(*at),

        Schedule::Interval { every_secs } => i64::try_from(*every_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|step| from.checked_add_signed(step)),

        Schedule::Daily { hour, minute } => {
            let candidate = at_time(from, *hour, *minute)?;
            if candidate > from {
                Some(candidate)
            } else {
                // Today's window has passed; advance to tomorrow.
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            // `day` follows ISO weekday numbering: 0=Monday … 6=Sunday,
            // which matches chrono's `num_days_from_monday`.
            let today = from.weekday().num_days_from_monday() as i64;
            let target = (*day as i64).clamp(0, 6);
            let days_ahead = (target - today).rem_euclid(7);
            let candidate = at_time(from + Duration::days(days_ahead), *hour, *minute)?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(7))
            }
        }

        Schedule::Cron { expression } => match expression.parse::<cron::Schedule>() {
            Ok(cron) => cron.after(&from).next(),
            Err(e) => {
                warn!(cron = %expression, error = %e, "invalid cron expression; job will not run");
                None
            }
        },
    }
}

/// `day` at HH:MM:00 UTC.
fn at_time(day: DateTime<Utc>, hour: u8, minute: u8) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(
        day.year(),
        day.month(),
        day.day(),
        hour as u32,
        minute as u32,
        0,
    )
    .single()
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate wants `sec min hour day-of-month month day-of-week`;
/// operators usually write the classic 5-field form.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Parse the duration of an `@every` schedule: `90`, `90s`, `15m`, `2h`.
pub(crate) fn parse_every(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let n: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => Some(n),
        "m" => n.checked_mul(60),
        "h" => n.checked_mul(3_600),
        _ => return None,
    }?;
    (secs > 0).then_some(secs)
}

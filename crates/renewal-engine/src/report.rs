use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    /// The `now` the pass evaluated against.
    pub evaluated_at: DateTime<Utc>,
    /// Tracked resources examined, resolved or not.
    pub processed: usize,
    /// Reminders delivered and recorded.
    pub sent: usize,
    /// Due reminders already delivered (or being delivered by a concurrent pass).
    pub skipped: usize,
    /// Due reminders whose send or record failed; retried next pass.
    /// A resource whose evaluation panicked counts once here.
    pub failed: usize,
    /// Reminders sent again because another writer recorded the key first.
    pub duplicates: usize,
    /// Resources with no known expiry.
    pub unresolved: usize,
}

impl EvaluationReport {
    pub(crate) fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            processed: 0,
            sent: 0,
            skipped: 0,
            failed: 0,
            duplicates: 0,
            unresolved: 0,
        }
    }

    pub(crate) fn absorb(&mut self, outcome: ResourceOutcome) {
        self.processed += 1;
        match outcome {
            ResourceOutcome::Unresolved => self.unresolved += 1,
            ResourceOutcome::Panicked => self.failed += 1,
            ResourceOutcome::Evaluated {
                sent,
                skipped,
                failed,
                duplicates,
            } => {
                self.sent += sent;
                self.skipped += skipped;
                self.failed += failed;
                self.duplicates += duplicates;
            }
        }
    }
}

/// What happened to one tracked resource during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceOutcome {
    Unresolved,
    Panicked,
    Evaluated {
        sent: usize,
        skipped: usize,
        failed: usize,
        duplicates: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_tallies_outcomes() {
        let mut report = EvaluationReport::new(Utc::now());
        report.absorb(ResourceOutcome::Unresolved);
        report.absorb(ResourceOutcome::Evaluated {
            sent: 1,
            skipped: 0,
            failed: 1,
            duplicates: 0,
        });
        report.absorb(ResourceOutcome::Evaluated {
            sent: 0,
            skipped: 2,
            failed: 0,
            duplicates: 1,
        });
        report.absorb(ResourceOutcome::Panicked);
        assert_eq!(report.processed, 4);
        assert_eq!(report.unresolved, 1);
        assert_eq!((report.sent, report.skipped, report.failed), (1, 2, 2));
        assert_eq!(report.duplicates, 1);
    }
}

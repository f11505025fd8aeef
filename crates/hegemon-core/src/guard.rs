//! Run guard: at most one committed run per pipeline period.
//!
//! Time is divided into fixed periods per pipeline (one hour for the
//! hourly tick, six hours for caravans by default). A committed run
//! records its period alongside the batch, in the same transaction, and
//! the store refuses a second record for the same period. Before computing
//! anything, the engine checks the last applied period and stops early if
//! this one is already done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hegemon_types::{Pipeline, TickRunId};

/// Index of the period containing `now`, counting from the Unix epoch.
///
/// A zero period length yields period zero.
pub fn period_index(now: DateTime<Utc>, period_secs: u64) -> i64 {
    let period = i64::try_from(period_secs).unwrap_or(i64::MAX);
    now.timestamp().checked_div_euclid(period).unwrap_or(0)
}

/// The record a committed run leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRun {
    /// Unique run identifier.
    pub id: TickRunId,
    /// Which pipeline ran.
    pub pipeline: Pipeline,
    /// The period the run covers.
    pub period: i64,
    /// When the run's computation started.
    pub started_at: DateTime<Utc>,
    /// Number of mutations committed.
    pub mutation_count: u64,
}

impl TickRun {
    /// Start a run record for `pipeline` at `now`.
    pub fn begin(pipeline: Pipeline, now: DateTime<Utc>, period_secs: u64) -> Self {
        Self {
            id: TickRunId::new(),
            pipeline,
            period: period_index(now, period_secs),
            started_at: now,
            mutation_count: 0,
        }
    }

    /// Whether a previously applied period blocks this run.
    pub fn is_blocked_by(&self, last_applied: Option<i64>) -> bool {
        last_applied.is_some_and(|last| last >= self.period)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    #[test]
    fn period_index_counts_whole_periods() {
        assert_eq!(period_index(at(0), 3600), 0);
        assert_eq!(period_index(at(3599), 3600), 0);
        assert_eq!(period_index(at(3600), 3600), 1);
        assert_eq!(period_index(at(7 * 3600 + 5), 3600), 7);
        assert_eq!(period_index(at(7 * 3600 + 5), 21_600), 1);
    }

    #[test]
    fn zero_period_is_period_zero() {
        assert_eq!(period_index(at(12_345), 0), 0);
    }

    #[test]
    fn same_or_later_period_blocks() {
        let run = TickRun::begin(Pipeline::Hourly, at(10 * 3600), 3600);
        assert_eq!(run.period, 10);
        assert!(!run.is_blocked_by(None));
        assert!(!run.is_blocked_by(Some(9)));
        assert!(run.is_blocked_by(Some(10)));
        assert!(run.is_blocked_by(Some(11)));
    }
}

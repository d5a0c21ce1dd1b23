//! Milestone detection: when each percent-of-goal threshold was first
//! crossed.

use super::buckets::elapsed_days_ceil;
use crate::types::LogEntry;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Percent-of-goal thresholds, ascending.
pub const MILESTONE_PERCENTS: [i64; 6] = [10, 25, 50, 75, 90, 100];

/// One milestone row of the subscription report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    /// Threshold as a percent of the goal
    pub percent: i64,
    /// Absolute cumulative sum needed to cross the threshold
    pub target_value: i64,
    /// Whether the current sum has reached the target
    pub achieved: bool,
    /// UTC day the threshold was first crossed; None when unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achieved_date: Option<NaiveDate>,
    /// Elapsed days from subscription start to the crossing, rounded up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_from_start: Option<i64>,
}

/// Detect milestones over the full log history.
///
/// `history` must be ordered ascending by cumulative sum; the first entry
/// whose cumulative sum reaches the target determines the achievement date.
/// An achieved threshold with no matching entry (stale subscription sum)
/// keeps `achieved = true` but omits the date rather than erroring.
pub fn detect(
    goal: i64,
    current_sum: i64,
    history: &[LogEntry],
    started_at: DateTime<Utc>,
) -> Vec<Milestone> {
    let goal = goal.max(1);
    MILESTONE_PERCENTS
        .iter()
        .map(|&percent| {
            let target_value = ((percent as f64 / 100.0) * goal as f64).ceil() as i64;
            let achieved = current_sum >= target_value;

            let crossing = if achieved {
                history.iter().find(|log| log.cumulative_sum >= target_value)
            } else {
                None
            };

            let (achieved_date, days_from_start) = match crossing {
                Some(log) => (
                    Some(log.timestamp.date_naive()),
                    Some(elapsed_days_ceil(started_at, log.timestamp)),
                ),
                None => (None, None),
            };

            Milestone {
                percent,
                target_value,
                achieved,
                achieved_date,
                days_from_start,
            }
        })
        .collect()
}

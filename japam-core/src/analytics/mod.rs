//! Pure analytics over daily buckets and log histories.
//!
//! Everything in this module is deterministic in its inputs; the report
//! assembly in [`report`] is the only part that touches the database.

pub mod buckets;
pub mod comparison;
pub mod heatmap;
pub mod milestones;
pub mod patterns;
pub mod report;
pub mod streak;
pub mod volume;

pub use buckets::{DailyBucket, MonthlyBucket, Period, WeeklyBucket};
pub use report::{overview_report, subscription_report, OverviewReport, SubscriptionReport};

/// Round to one decimal place, the precision used for report averages.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::round1;

    #[test]
    fn test_round1() {
        assert_eq!(round1(2.571_428), 2.6);
        assert_eq!(round1(2.0), 2.0);
        assert_eq!(round1(0.04), 0.0);
        assert_eq!(round1(-1.25), -1.3); // round() ties away from zero
    }
}

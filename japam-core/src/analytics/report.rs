//! Report assembly: composes the pure analytics passes into the
//! subscription-level and account-level response structures.
//!
//! Reads run sequentially against the shared connection; any failed read
//! aborts the whole report rather than returning partial analytics.

use super::buckets::{
    self, midnight_utc, monthly_rollup, weekly_rollup, DailyBucket, Period, WeeklyBucket,
};
use super::comparison::{self, Comparison};
use super::heatmap::{self, ConsistentWeek};
use super::milestones::{self, Milestone};
use super::patterns::{self, DayOfWeekInsights, TimeOfDayInsights};
use super::round1;
use super::streak;
use super::volume::{self, BestDay, BestMonth, BestWeek, GoalStatus, Progress};
use crate::db::Database;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Heatmap window for the subscription view, in days back from today.
const SUBSCRIPTION_HEATMAP_DAYS: u64 = 90;
/// Trend window for the account overview, in days back from today.
const OVERVIEW_TREND_DAYS: i64 = 30;

// ============================================
// Subscription report
// ============================================

/// Identity section of a subscription report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub goal: i64,
    pub current_count: i64,
    pub subscription_date: DateTime<Utc>,
}

/// Time window the report covers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_in_range: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMetrics {
    pub total_count: i64,
    pub daily_average: f64,
    pub weekly_average: f64,
    pub monthly_average: f64,
    pub best_day: Option<BestDay>,
    pub best_week: Option<BestWeek>,
    pub best_month: Option<BestMonth>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakAnalytics {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub total_active_days: i64,
    pub calendar_heatmap: Vec<DailyBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInsights {
    pub time_of_day: TimeOfDayInsights,
    pub day_of_week: DayOfWeekInsights,
    pub consistency_score: i64,
}

/// Longest-streak entry of the personal records section.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreakRecord {
    pub days: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalRecords {
    pub highest_single_day: Option<BestDay>,
    pub longest_streak: StreakRecord,
    pub most_consistent_week: Option<ConsistentWeek>,
}

/// Monthly chart point, labeled "Jan 2026" style.
#[derive(Debug, Clone, Serialize)]
pub struct MonthPoint {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub daily: Vec<DailyBucket>,
    pub weekly: Vec<WeeklyBucket>,
    pub monthly: Vec<MonthPoint>,
}

/// Full analytics response for one subscription.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionReport {
    pub subscription: SubscriptionSummary,
    pub time_range: TimeRange,
    pub volume_metrics: VolumeMetrics,
    pub streak_analytics: StreakAnalytics,
    pub progress_analytics: Progress,
    pub pattern_insights: PatternInsights,
    pub comparison: Comparison,
    pub milestones: Vec<Milestone>,
    pub personal_records: PersonalRecords,
    pub chart_data: ChartData,
}

/// Assemble the full subscription report.
///
/// Fails with not-found before running any analytics when the subscription
/// or its event is missing. Pure with respect to the log snapshot: the same
/// store state and `now` always produce the same report.
pub fn subscription_report(
    db: &Database,
    subscription_id: &str,
    period: Period,
    now: DateTime<Utc>,
) -> Result<SubscriptionReport> {
    let subscription = db
        .get_subscription(subscription_id)?
        .ok_or_else(|| Error::SubscriptionNotFound(subscription_id.to_string()))?;
    let event = db
        .get_event(&subscription.event_id)?
        .ok_or_else(|| Error::EventNotFound(subscription.event_id.clone()))?;

    let user_id = &subscription.user_id;
    let event_id = &subscription.event_id;
    let goal = event.goal_value.max(1);
    let current_count = subscription.current_sum;

    let all_days = db.daily_counts(user_id, event_id)?;
    let period_start = period.start(now);
    let period_days = match period_start {
        Some(start) => db.daily_counts_since(user_id, event_id, start)?,
        None => all_days.clone(),
    };
    let hourly = db.hourly_distribution(user_id, event_id)?;
    let day_of_week = db.day_of_week_distribution(user_id, event_id)?;
    let history = db.log_history(user_id, event_id)?;

    let weekly = weekly_rollup(&period_days);
    let monthly = monthly_rollup(&period_days);

    let today = now.date_naive();
    let windows = volume::rolling_windows(&all_days, now);
    let days_subscribed = buckets::days_subscribed(subscription.started_at, now);
    let active_days = all_days.len() as i64;
    let averages = volume::averages(current_count, days_subscribed, active_days, &windows);

    let streaks = streak::calculate(&all_days, today);
    let calendar_heatmap = heatmap::build(&all_days, SUBSCRIPTION_HEATMAP_DAYS, now);

    let start_date = period_start
        .map(|s| s.date_naive())
        .unwrap_or_else(|| subscription.started_at.date_naive());
    let days_in_range = buckets::elapsed_days_ceil(midnight_utc(start_date), now).max(1);

    Ok(SubscriptionReport {
        subscription: SubscriptionSummary {
            id: subscription.id.clone(),
            title: event.title.clone(),
            subtitle: event.subtitle.clone(),
            goal,
            current_count,
            subscription_date: subscription.started_at,
        },
        time_range: TimeRange {
            start_date,
            end_date: today,
            days_in_range,
        },
        volume_metrics: VolumeMetrics {
            total_count: current_count,
            daily_average: round1(averages.daily),
            weekly_average: round1(averages.weekly),
            monthly_average: round1(averages.monthly),
            best_day: volume::best_day(&all_days),
            best_week: volume::best_week(&weekly),
            best_month: volume::best_month(&monthly),
        },
        streak_analytics: StreakAnalytics {
            current_streak: streaks.current,
            longest_streak: streaks.longest,
            total_active_days: active_days,
            calendar_heatmap: calendar_heatmap.clone(),
        },
        progress_analytics: volume::progress(current_count, goal, days_subscribed, &windows, now),
        pattern_insights: PatternInsights {
            time_of_day: patterns::time_of_day(&hourly),
            day_of_week: patterns::day_of_week(&day_of_week),
            consistency_score: patterns::consistency_score(active_days, days_subscribed),
        },
        comparison: comparison::compare(&all_days, &windows, period, now),
        milestones: milestones::detect(goal, current_count, &history, subscription.started_at),
        personal_records: PersonalRecords {
            highest_single_day: volume::best_day(&all_days),
            longest_streak: StreakRecord {
                days: streaks.longest,
            },
            most_consistent_week: heatmap::most_consistent_week(&calendar_heatmap),
        },
        chart_data: ChartData {
            daily: period_days,
            weekly,
            monthly: monthly
                .iter()
                .map(|m| MonthPoint {
                    month: format!("{} {}", buckets::month_abbrev(m.month), m.year),
                    count: m.count,
                })
                .collect(),
        },
    })
}

// ============================================
// Account overview report
// ============================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_logs: i64,
    pub total_active_days: i64,
    pub total_japams: i64,
    pub active_japams: i64,
    pub completed_japams: i64,
    pub overall_streak: i64,
}

/// Direction of the last-15-vs-prior-15-day activity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityTrendLabel {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTrend {
    pub last_30_days: Vec<DailyBucket>,
    pub trend: ActivityTrendLabel,
    pub percent_change: i64,
}

/// One row of the per-subscription performance list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JapamPerformance {
    pub subscription_id: String,
    pub title: String,
    /// Percent of goal reached, capped at 100
    pub progress: i64,
    pub status: GoalStatus,
    /// Share of the user's total logs that belong to this event
    pub activity_percent: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MostActive {
    pub title: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LongestStreakPerformer {
    pub title: String,
    pub days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestToGoal {
    pub title: String,
    pub percent: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformers {
    pub most_active: Option<MostActive>,
    pub longest_streak: Option<LongestStreakPerformer>,
    pub nearest_to_goal: Option<NearestToGoal>,
}

/// Account-level analytics across all of a user's subscriptions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
    pub aggregate_stats: AggregateStats,
    pub activity_trend: ActivityTrend,
    pub japam_performance: Vec<JapamPerformance>,
    pub top_performers: TopPerformers,
}

/// Assemble the account overview.
///
/// Subscriptions are walked oldest-first, so "first max wins" selections
/// (most active, longest streak) resolve ties to the earliest subscription.
pub fn overview_report(db: &Database, user_id: &str, now: DateTime<Utc>) -> Result<OverviewReport> {
    db.get_user(user_id)?
        .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;

    let subscriptions = db.list_subscriptions_with_events(user_id)?;
    let all_days = db.user_daily_counts(user_id)?;
    let trend_days =
        db.user_daily_counts_since(user_id, now - Duration::days(OVERVIEW_TREND_DAYS))?;
    let counts_by_event: HashMap<String, i64> =
        db.log_counts_by_event(user_id)?.into_iter().collect();

    let total_logs: i64 = counts_by_event.values().sum();
    let today = now.date_naive();
    let overall_streak = streak::calculate(&all_days, today).current;

    let mut active_japams = 0i64;
    let mut completed_japams = 0i64;
    let mut performance = Vec::with_capacity(subscriptions.len());
    let mut most_active: Option<MostActive> = None;
    let mut nearest_to_goal: Option<NearestToGoal> = None;
    let mut longest_streak: Option<LongestStreakPerformer> = None;

    for (subscription, event) in &subscriptions {
        let sum = subscription.current_sum;
        let goal = event.goal_value.max(1);
        let progress = (((sum as f64 / goal as f64) * 100.0).round() as i64).min(100);
        let event_logs = counts_by_event.get(&event.id).copied().unwrap_or(0);
        let activity_percent = if total_logs > 0 {
            ((event_logs as f64 / total_logs as f64) * 100.0).round() as i64
        } else {
            0
        };

        // Overview pace is lifetime sum per subscribed day, not trailing-7
        let status = if sum >= goal {
            completed_japams += 1;
            GoalStatus::Completed
        } else {
            active_japams += 1;
            let sub_days = buckets::days_subscribed(subscription.started_at, now);
            let current_pace = sum as f64 / sub_days as f64;
            let required_pace = (goal - sum) as f64 / sub_days as f64;
            if current_pace > 0.0 && required_pace > 0.0 {
                let ratio = current_pace / required_pace;
                if ratio >= 1.2 {
                    GoalStatus::Ahead
                } else if ratio < 0.8 {
                    GoalStatus::Behind
                } else {
                    GoalStatus::OnTrack
                }
            } else {
                GoalStatus::OnTrack
            }
        };

        performance.push(JapamPerformance {
            subscription_id: subscription.id.clone(),
            title: event.title.clone(),
            progress,
            status,
            activity_percent,
        });

        if most_active.as_ref().map_or(true, |m| event_logs > m.count) {
            most_active = Some(MostActive {
                title: event.title.clone(),
                count: event_logs,
            });
        }
        if status != GoalStatus::Completed
            && progress > 0
            && nearest_to_goal.as_ref().map_or(true, |n| progress > n.percent)
        {
            nearest_to_goal = Some(NearestToGoal {
                title: event.title.clone(),
                percent: progress,
            });
        }

        let event_days = db.daily_counts(user_id, &event.id)?;
        let event_longest = streak::calculate(&event_days, today).longest;
        if longest_streak.as_ref().map_or(true, |l| event_longest > l.days) {
            longest_streak = Some(LongestStreakPerformer {
                title: event.title.clone(),
                days: event_longest,
            });
        }
    }

    // Dense 31-entry trend series, split into trailing-15 vs the 15 before
    let counts: HashMap<NaiveDate, i64> = trend_days.iter().map(|d| (d.date, d.count)).collect();
    let last_15_cutoff = now - Duration::days(15);
    let mut last_30_days = Vec::new();
    let mut last_15 = 0i64;
    let mut prior_15 = 0i64;
    let mut cursor = (now - Duration::days(OVERVIEW_TREND_DAYS)).date_naive();
    while cursor <= today {
        let count = counts.get(&cursor).copied().unwrap_or(0);
        last_30_days.push(DailyBucket {
            date: cursor,
            count,
        });
        if midnight_utc(cursor) >= last_15_cutoff {
            last_15 += count;
        } else {
            prior_15 += count;
        }
        cursor = match cursor.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    let percent_change = comparison::percent_change(last_15, prior_15);
    let trend = if percent_change > 10 {
        ActivityTrendLabel::Increasing
    } else if percent_change < -10 {
        ActivityTrendLabel::Decreasing
    } else {
        ActivityTrendLabel::Stable
    };

    Ok(OverviewReport {
        aggregate_stats: AggregateStats {
            total_logs,
            total_active_days: all_days.len() as i64,
            total_japams: subscriptions.len() as i64,
            active_japams,
            completed_japams,
            overall_streak,
        },
        activity_trend: ActivityTrend {
            last_30_days,
            trend,
            percent_change,
        },
        japam_performance: performance,
        top_performers: TopPerformers {
            most_active,
            longest_streak,
            nearest_to_goal,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Event, User, Visibility};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn seeded() -> (Database, String, String, String) {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let user = User::new("Asha", "asha@example.com", ts("2026-08-01T00:00:00Z"));
        db.insert_user(&user).unwrap();
        let event = Event::new(
            "Gayatri Japa",
            "108 daily",
            100,
            50,
            Visibility::Public,
            &user.id,
            ts("2026-08-01T00:00:00Z"),
        );
        db.insert_event(&event).unwrap();
        let sub = db
            .subscribe(&user.id, &event.id, ts("2026-08-10T00:00:00Z"))
            .unwrap();
        (db, user.id, event.id, sub.id)
    }

    #[test]
    fn test_subscription_report_sections() {
        let (db, user_id, event_id, sub_id) = seeded();
        let now = ts("2026-08-25T12:00:00Z");
        for day in 20..=25 {
            for rep in 0..3 {
                db.append_log(&user_id, &event_id, ts(&format!("2026-08-{day}T0{rep}:30:00Z")))
                    .unwrap();
            }
        }

        let report = subscription_report(&db, &sub_id, Period::All, now).unwrap();

        assert_eq!(report.subscription.title, "Gayatri Japa");
        assert_eq!(report.subscription.current_count, 18);
        assert_eq!(report.volume_metrics.total_count, 18);
        assert_eq!(report.streak_analytics.current_streak, 6);
        assert_eq!(report.streak_analytics.longest_streak, 6);
        assert_eq!(report.streak_analytics.total_active_days, 6);
        assert_eq!(report.streak_analytics.calendar_heatmap.len(), 91);
        assert_eq!(report.milestones.len(), 6);
        assert!(report.milestones[0].achieved); // 10% of 100 with sum 18
        assert_eq!(report.personal_records.longest_streak.days, 6);
        assert_eq!(report.chart_data.daily.len(), 6);
        assert_eq!(report.time_range.start_date, "2026-08-10".parse().unwrap());
        assert_eq!(report.time_range.end_date, "2026-08-25".parse().unwrap());
    }

    #[test]
    fn test_subscription_report_not_found() {
        let (db, _, _, _) = seeded();
        assert!(matches!(
            subscription_report(&db, "missing", Period::All, Utc::now()),
            Err(Error::SubscriptionNotFound(_))
        ));
    }

    #[test]
    fn test_overview_aggregates_across_events() {
        let (db, user_id, event_id, _) = seeded();
        let now = ts("2026-08-25T12:00:00Z");

        let second = Event::new(
            "Om Namah Shivaya",
            "",
            10,
            50,
            Visibility::Private,
            &user_id,
            ts("2026-08-01T00:00:00Z"),
        );
        db.insert_event(&second).unwrap();
        db.subscribe(&user_id, &second.id, ts("2026-08-12T00:00:00Z")).unwrap();

        for day in 23..=25 {
            db.append_log(&user_id, &event_id, ts(&format!("2026-08-{day}T06:00:00Z")))
                .unwrap();
        }
        // Complete the small event
        for i in 0..10 {
            db.append_log(&user_id, &second.id, ts(&format!("2026-08-24T1{i}:00:00Z")))
                .unwrap();
        }

        let report = overview_report(&db, &user_id, now).unwrap();

        assert_eq!(report.aggregate_stats.total_logs, 13);
        assert_eq!(report.aggregate_stats.total_japams, 2);
        assert_eq!(report.aggregate_stats.active_japams, 1);
        assert_eq!(report.aggregate_stats.completed_japams, 1);
        assert_eq!(report.aggregate_stats.overall_streak, 3);
        assert_eq!(report.activity_trend.last_30_days.len(), 31);

        let most_active = report.top_performers.most_active.unwrap();
        assert_eq!(most_active.title, "Om Namah Shivaya");
        assert_eq!(most_active.count, 10);

        // Completed events never appear as nearest-to-goal
        let nearest = report.top_performers.nearest_to_goal.unwrap();
        assert_eq!(nearest.title, "Gayatri Japa");
        assert_eq!(nearest.percent, 3);
    }

    #[test]
    fn test_overview_unknown_user() {
        let (db, _, _, _) = seeded();
        assert!(matches!(
            overview_report(&db, "ghost", Utc::now()),
            Err(Error::UserNotFound(_))
        ));
    }

    #[test]
    fn test_report_idempotent_for_fixed_snapshot() {
        let (db, user_id, event_id, sub_id) = seeded();
        let now = ts("2026-08-25T12:00:00Z");
        db.append_log(&user_id, &event_id, ts("2026-08-24T06:00:00Z")).unwrap();

        let a = subscription_report(&db, &sub_id, Period::Week, now).unwrap();
        let b = subscription_report(&db, &sub_id, Period::Week, now).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

//! Growth metrics and the nightly snapshot job.
//!
//! The nightly job aggregates the previous day's activity into persisted
//! `metrics_snapshots` rows: one admin row with entity counts, plus one row
//! per (user, event) pair that logged anything in the window. Reruns for
//! the same day overwrite rather than duplicate.

use crate::db::{Database, MetricsSnapshot};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Count of one entity type: lifetime total, count since the cutoff, and
/// the share of the total that the recent count represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthStat {
    pub total: i64,
    #[serde(rename = "lastWeek")]
    pub since: i64,
    pub percentage: f64,
}

impl GrowthStat {
    fn new(total: i64, since: i64) -> Self {
        let percentage = if total > 0 {
            round2(since as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
        Self {
            total,
            since,
            percentage,
        }
    }
}

/// Admin-facing growth summary across all entity types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub users: GrowthStat,
    pub events: GrowthStat,
    pub subscriptions: GrowthStat,
    pub logs: GrowthStat,
}

/// Compute growth stats for everything created at or after `from`.
pub fn growth_metrics(db: &Database, from: DateTime<Utc>) -> Result<GrowthMetrics> {
    let [users, events, subscriptions, logs] = db.growth_counts(from)?;
    Ok(GrowthMetrics {
        users: GrowthStat::new(users.0, users.1),
        events: GrowthStat::new(events.0, events.1),
        subscriptions: GrowthStat::new(subscriptions.0, subscriptions.1),
        logs: GrowthStat::new(logs.0, logs.1),
    })
}

/// Run the nightly snapshot for the day ending at `as_of`.
///
/// The window is the 24 hours before `as_of`, half-open at the upper end.
/// A failure in one section is logged and skipped rather than aborting the
/// run; the job is driven by an external scheduler and retried wholesale.
/// Returns the number of snapshot rows written.
pub fn run_nightly_snapshot(db: &Database, as_of: DateTime<Utc>) -> Result<usize> {
    let lower = as_of - Duration::days(1);
    let snapshot_date = as_of.date_naive();
    tracing::info!(%lower, %as_of, "Nightly snapshot started");

    let mut written = 0usize;

    match db.entity_counts_between(lower, as_of) {
        Ok(counts) => {
            let row = MetricsSnapshot {
                snapshot_date,
                scope: "admin".to_string(),
                user_id: None,
                event_id: None,
                payload: serde_json::to_value(&counts)?,
                computed_at: Utc::now(),
            };
            db.upsert_metrics_snapshot(&row)?;
            written += 1;
        }
        Err(e) => {
            tracing::error!(error = %e, "Admin metrics failed");
        }
    }

    match db.log_counts_between(lower, as_of) {
        Ok(pairs) => {
            for pair in pairs {
                let row = MetricsSnapshot {
                    snapshot_date,
                    scope: "subscription".to_string(),
                    user_id: Some(pair.user_id),
                    event_id: Some(pair.event_id),
                    payload: serde_json::json!({ "logCount": pair.count }),
                    computed_at: Utc::now(),
                };
                db.upsert_metrics_snapshot(&row)?;
                written += 1;
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Per-subscription metrics failed");
        }
    }

    tracing::info!(written, "Nightly snapshot finished");
    Ok(written)
}

/// Round to two decimal places, the precision used for growth percentages.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

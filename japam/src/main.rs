//! japam - devotional habit-tracking backend CLI
//!
//! Manages users, events, subscriptions, and logs, and runs the analytics
//! reports and the nightly metrics job against the local store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use japam_core::analytics::buckets::Period;
use japam_core::analytics::{overview_report, subscription_report};
use japam_core::metrics::{growth_metrics, run_nightly_snapshot};
use japam_core::types::{Event, User, Visibility};
use japam_core::{Config, Database};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "japam")]
#[command(about = "Japam habit-tracking backend")]
#[command(version)]
struct Args {
    /// Override the database path from the config file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a user
    UserAdd {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },

    /// Soft-delete a user (keeps the account and its logs)
    UserRemove {
        #[arg(long)]
        user: String,
    },

    /// Create an event
    EventAdd {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        /// Target repetition count
        #[arg(long)]
        goal: i64,
        #[arg(long, default_value_t = 100)]
        max_subscribers: i64,
        /// public, private, or group
        #[arg(long, default_value = "private")]
        visibility: String,
        /// User id of the creator
        #[arg(long)]
        created_by: String,
    },

    /// Subscribe a user to an event, by event id or join code
    Subscribe {
        #[arg(long)]
        user: String,
        #[arg(long, conflicts_with = "join_code")]
        event: Option<String>,
        #[arg(long)]
        join_code: Option<String>,
    },

    /// Record one repetition
    Log {
        #[arg(long)]
        user: String,
        #[arg(long)]
        event: String,
        /// Timestamp (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Full analytics report for one subscription
    Report {
        #[arg(long)]
        subscription: String,
        /// week, month, quarter, year, or all
        #[arg(long, default_value = "all")]
        period: String,
    },

    /// Account-level analytics across all of a user's subscriptions
    Overview {
        #[arg(long)]
        user: String,
    },

    /// Recompute every subscription's sum from its logs
    Reconcile,

    /// Run the nightly metrics snapshot
    Nightly {
        /// End of the snapshot window (RFC 3339); defaults to now
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },

    /// Growth metrics since a cutoff
    Metrics {
        /// Cutoff timestamp (RFC 3339)
        #[arg(long)]
        from: DateTime<Utc>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        japam_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = args.database.unwrap_or_else(|| config.database_path());
    tracing::debug!(?db_path, "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match args.command {
        Command::UserAdd { name, email } => {
            let user = User::new(&name, &email, Utc::now());
            db.insert_user(&user).context("failed to create user")?;
            print_json(&user)?;
        }

        Command::UserRemove { user } => {
            db.tombstone_user(&user, Utc::now())
                .context("failed to remove user")?;
            println!("User {} removed", user);
        }

        Command::EventAdd {
            title,
            subtitle,
            goal,
            max_subscribers,
            visibility,
            created_by,
        } => {
            let visibility: Visibility = visibility
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let event = Event::new(
                &title,
                &subtitle,
                goal,
                max_subscribers,
                visibility,
                &created_by,
                Utc::now(),
            );
            db.insert_event(&event).context("failed to create event")?;
            print_json(&event)?;
        }

        Command::Subscribe {
            user,
            event,
            join_code,
        } => {
            let event_id = match (event, join_code) {
                (Some(id), _) => id,
                (None, Some(code)) => db
                    .get_event_by_join_code(&code)?
                    .with_context(|| format!("no event with join code {}", code))?
                    .id,
                (None, None) => anyhow::bail!("either --event or --join-code is required"),
            };
            let subscription = db
                .subscribe(&user, &event_id, Utc::now())
                .context("failed to subscribe")?;
            print_json(&subscription)?;
        }

        Command::Log { user, event, at } => {
            let entry = db
                .append_log(&user, &event, at.unwrap_or_else(Utc::now))
                .context("failed to record log")?;
            print_json(&entry)?;
        }

        Command::Report {
            subscription,
            period,
        } => {
            let period: Period = period.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let report = subscription_report(&db, &subscription, period, Utc::now())
                .context("failed to compute subscription report")?;
            print_json(&report)?;
        }

        Command::Overview { user } => {
            let report = overview_report(&db, &user, Utc::now())
                .context("failed to compute overview report")?;
            print_json(&report)?;
        }

        Command::Reconcile => {
            let changed = db
                .reconcile_subscription_sums()
                .context("failed to reconcile subscription sums")?;
            println!("Reconciled {} subscription(s)", changed);
        }

        Command::Nightly { as_of } => {
            let written = run_nightly_snapshot(&db, as_of.unwrap_or_else(Utc::now))
                .context("nightly snapshot failed")?;
            println!("Wrote {} metrics row(s)", written);
        }

        Command::Metrics { from } => {
            let metrics = growth_metrics(&db, from).context("failed to compute growth metrics")?;
            print_json(&metrics)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

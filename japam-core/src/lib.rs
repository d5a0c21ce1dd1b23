//! # japam-core
//!
//! Core library for japam - a devotional habit-tracking backend.
//!
//! This library provides:
//! - Domain types for users, events, subscriptions, and logs
//! - Database storage layer with SQLite
//! - Analytics: streaks, volume and pace, patterns, milestones, reports
//! - Growth metrics and the nightly snapshot job
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way: raw log entries are bucketed into per-day counts by
//! the storage layer, independent derivation passes (streak, volume,
//! pattern, milestone, comparison, heatmap) run over those buckets, and
//! the report assembler composes the results into one response.
//!
//! ## Example
//!
//! ```rust,no_run
//! use japam_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&config.database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod types;

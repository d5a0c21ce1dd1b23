//! Database layer for japam
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - Daily bucketing and histogram queries feeding the analytics modules

pub mod repo;
pub mod schema;

pub use repo::{Database, EntityCounts, MetricsSnapshot, PairCount};

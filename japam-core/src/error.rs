//! Error types for japam-core

use thiserror::Error;

/// Main error type for the japam-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// User not found
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Event not found
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// Subscription not found
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Log append attempted without a subscription
    #[error("user {user_id} is not subscribed to event {event_id}")]
    NotSubscribed { user_id: String, event_id: String },

    /// Duplicate subscription for a (user, event) pair
    #[error("subscription already exists for user {user_id} on event {event_id}")]
    SubscriptionExists { user_id: String, event_id: String },

    /// Event has reached its maximum subscriber count
    #[error("event {0} has reached its maximum subscriber count")]
    EventFull(String),
}

/// Result type alias for japam-core
pub type Result<T> = std::result::Result<T, Error>;

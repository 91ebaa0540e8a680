//! error.rs
//! Defines the error and result types returned by limiter construction and
//! tracking accessors.
//!
//! Running out of tokens is never an error: acquisition reports it as `false`.

use std::time::Duration;

/// Error type for rate limiter configuration and tracking accessors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum RateLimiterError {
    /// The call limit of a period-based rate is zero.
    #[error("limit must be positive")]
    InvalidLimit,

    /// The period of a period-based rate is zero.
    #[error("period must be positive, got {0:?}")]
    InvalidPeriod(Duration),

    /// A calls-per-second rate is zero, negative or not finite.
    #[error("max_calls_per_second must be positive, got {0}")]
    InvalidRate(f64),

    /// The initial token count lies outside `0..=capacity`.
    #[error("initial_tokens must be between 0 and {capacity}, got {initial}")]
    InvalidInitialTokens {
        /// Requested initial token count.
        initial: f64,
        /// Capacity of the bucket.
        capacity: f64,
    },

    /// The history window of the call tracker is zero.
    #[error("history_window must be positive")]
    InvalidHistoryWindow,

    /// A windowed tracking query was given a zero window.
    #[error("window_seconds must be positive")]
    InvalidWindow,

    /// A tracking accessor was called on a limiter built without tracking.
    #[error("Call tracking is not enabled")]
    TrackingDisabled,
}

impl RateLimiterError {
    /// Returns `true` for errors caused by an invalid argument or configuration.
    pub fn is_invalid_argument(&self) -> bool {
        !self.is_invalid_state()
    }

    /// Returns `true` for errors caused by calling an accessor in the wrong state.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, RateLimiterError::TrackingDisabled)
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, RateLimiterError>;

//! Unsynchronized state machines behind the rate limiter; the owner serializes access.
//!
//! Both cores are plain data structures mutated through `&mut self`. The
//! [`RateLimiter`](crate::RateLimiter) owns one of each behind a single mutex;
//! they are public so that callers with their own synchronization (or tests
//! with synthetic instants) can drive them directly.
//!
//! - **[`TokenBucket`]** - continuous-time refill and single-token consumption
//! - **[`CallTracker`]** - bounded per-call history and derived statistics
//!
//! Every time-dependent operation has an `_at` variant taking an explicit
//! [`Instant`](std::time::Instant), mirroring the plain variant that reads the
//! clock itself.

pub mod token_bucket;
pub use token_bucket::TokenBucket;
pub use token_bucket::TokenBucketConfig;
pub use token_bucket::FRACTIONAL_CEILING;

pub mod call_tracker;
pub use call_tracker::CallStats;
pub use call_tracker::CallTracker;
pub use call_tracker::{DEFAULT_EFFICIENCY_WINDOW, DEFAULT_HISTORY_WINDOW};

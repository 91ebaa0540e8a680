//! A process-local token bucket rate limiter.
//!
//! This library throttles how often an action runs, typically outgoing calls
//! to an external API, to a configured maximum rate. It supports blocking,
//! non-blocking and async acquisition against the same bucket, and can
//! optionally record per-call statistics.
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use rate_guard_limiter::RateLimiter;
//!
//! // 120 calls per minute, bucket starts full
//! let limiter = RateLimiter::per_period(120, Duration::from_secs(60)).unwrap();
//!
//! let response = limiter.run(|| "call the API here");
//! assert_eq!(response, "call the API here");
//! ```
//!
//! # Core Concepts
//!
//! ## Token Bucket
//! The bucket holds up to `capacity` tokens and refills continuously at
//! `limit / period` tokens per second. Each acquisition takes one token. See
//! [`cores::TokenBucket`] for the refill rules, including the relaxed ceiling
//! for buckets smaller than one token.
//!
//! ## Acquisition
//! - [`RateLimiter::try_acquire`] returns immediately
//! - [`RateLimiter::acquire`] blocks the thread, with an optional timeout
//! - [`RateLimiter::async_acquire`] and [`RateLimiter::async_try_acquire`]
//!   suspend the task and do the work on a worker thread (feature `async`)
//! - [`RateLimiter::permit`], [`RateLimiter::run`] and their async forms
//!   scope a block of code to a secured token
//!
//! Running out of time is not an error: timed acquisitions return `false`.
//!
//! ## Call Tracking
//! With [`RateLimiterConfig::with_tracking`] every successful acquisition is
//! recorded once, whatever path it came through. Tracking accessors return
//! [`RateLimiterError::TrackingDisabled`] otherwise.
//!
//! ## Error Handling
//! All errors are reported synchronously by the call that received the bad
//! argument; see [`RateLimiterError`].
//!
//! ## Thread Safety
//! A [`RateLimiter`] is `Clone + Send + Sync`. Clones share one bucket behind
//! one mutex, which is never held while sleeping.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod config;
pub use config::{DeprecationPolicy, RateLimiterConfig, RateSpec};

pub mod cores;
pub use cores::CallStats;

pub mod error;
pub use error::{RateLimiterError, Result};

mod rate_limiter;
pub use rate_limiter::{Permit, RateLimiter};

#[cfg(feature = "async")]
mod runtime;

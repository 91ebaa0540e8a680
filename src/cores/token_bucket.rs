use std::time::{Duration, Instant};

/// Ceiling used instead of `capacity` when the capacity is below one token.
///
/// A bucket holding at most 0.4 tokens could never reach the single token an
/// acquisition needs, so fractional buckets may accumulate up to two tokens.
pub const FRACTIONAL_CEILING: f64 = 2.0;

/// Continuous-time token bucket state machine.
///
/// Tokens accrue at `refill_rate` tokens per second, computed from the time
/// elapsed since the last refill, and are capped at the bucket capacity. Each
/// acquisition consumes exactly one token.
///
/// The bucket holds no lock of its own. Every mutating method takes
/// `&mut self`, so the owner decides how access is serialized; the
/// [`RateLimiter`](crate::RateLimiter) keeps the bucket behind the same mutex
/// as its call tracker.
///
/// # Algorithm Behavior
///
/// - Refill adds `elapsed_seconds * refill_rate` tokens, up to the ceiling
/// - The ceiling is `capacity`, or [`FRACTIONAL_CEILING`] when `capacity < 1.0`
/// - An instant at or before the last refill leaves the bucket untouched
/// - An unlimited bucket always grants and never refills
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use rate_guard_limiter::cores::TokenBucket;
///
/// let start = Instant::now();
/// // 2 tokens per second, capacity 2, starts full
/// let mut bucket = TokenBucket::new_at(2.0, 2.0, 2.0, start);
///
/// assert!(bucket.try_consume_one_at(start));
/// assert!(bucket.try_consume_one_at(start));
/// assert!(!bucket.try_consume_one_at(start));
///
/// // Half a second later one token has accrued
/// assert!(bucket.try_consume_one_at(start + Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum number of tokens under normal operation
    capacity: f64,
    /// Tokens currently available
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    /// Instant of the last refill computation
    last_refill: Instant,
    /// Grants every request without refill arithmetic
    unlimited: bool,
}

impl TokenBucket {
    /// Creates a bucket whose refill clock starts now.
    ///
    /// # Panics
    ///
    /// Panics if `refill_rate` or `capacity` is not a positive finite number, or
    /// if `initial_tokens` lies outside `0..=capacity`.
    pub fn new(refill_rate: f64, capacity: f64, initial_tokens: f64) -> Self {
        Self::new_at(refill_rate, capacity, initial_tokens, Instant::now())
    }

    /// Creates a bucket whose refill clock starts at `now`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`TokenBucket::new`].
    pub fn new_at(refill_rate: f64, capacity: f64, initial_tokens: f64, now: Instant) -> Self {
        assert!(
            refill_rate.is_finite() && refill_rate > 0.0,
            "refill_rate must be greater than 0"
        );
        assert!(
            capacity.is_finite() && capacity > 0.0,
            "capacity must be greater than 0"
        );
        assert!(
            (0.0..=capacity).contains(&initial_tokens),
            "initial_tokens must be between 0 and capacity"
        );

        TokenBucket {
            capacity,
            tokens: initial_tokens,
            refill_rate,
            last_refill: now,
            unlimited: false,
        }
    }

    /// Creates a bucket that grants every request.
    ///
    /// Capacity, tokens and rate all read as `f64::INFINITY`; none of them
    /// ever change.
    pub fn unlimited() -> Self {
        TokenBucket {
            capacity: f64::INFINITY,
            tokens: f64::INFINITY,
            refill_rate: f64::INFINITY,
            last_refill: Instant::now(),
            unlimited: true,
        }
    }

    /// Maximum number of tokens under normal operation.
    #[inline]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per second.
    #[inline]
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// Upper bound the token count is clamped to during refill.
    #[inline]
    pub fn ceiling(&self) -> f64 {
        if self.capacity < 1.0 {
            FRACTIONAL_CEILING
        } else {
            self.capacity
        }
    }

    /// Adds the tokens accrued since the last refill.
    pub fn refill(&mut self) {
        self.refill_at(Instant::now())
    }

    /// Adds the tokens accrued between the last refill and `now`.
    ///
    /// If `now` is not after the last refill (same instant, or a caller
    /// holding an older timestamp) the call does nothing.
    pub fn refill_at(&mut self, now: Instant) {
        if self.unlimited {
            return;
        }

        let elapsed = match now.checked_duration_since(self.last_refill) {
            Some(elapsed) if !elapsed.is_zero() => elapsed,
            _ => return,
        };

        let accrued = elapsed.as_secs_f64() * self.refill_rate;
        self.tokens = (self.tokens + accrued).min(self.ceiling());
        self.last_refill = now;
    }

    /// Refills, then consumes one token if available.
    pub fn try_consume_one(&mut self) -> bool {
        self.try_consume_one_at(Instant::now())
    }

    /// Refills up to `now`, then consumes one token if available.
    ///
    /// # Returns
    /// * `true` - a token was consumed (unlimited buckets keep their count)
    /// * `false` - fewer than one token is available
    pub fn try_consume_one_at(&mut self, now: Instant) -> bool {
        if self.unlimited {
            return true;
        }

        self.refill_at(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Minimum wait before one token is available.
    pub fn time_until_available(&mut self) -> Duration {
        self.time_until_available_at(Instant::now())
    }

    /// Minimum wait, measured from `now`, before one token is available.
    ///
    /// Never consumes. Returns [`Duration::ZERO`] when a token is already
    /// available or the bucket is unlimited.
    pub fn time_until_available_at(&mut self, now: Instant) -> Duration {
        if self.unlimited {
            return Duration::ZERO;
        }

        self.refill_at(now);

        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }

        let seconds = (1.0 - self.tokens) / self.refill_rate;
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Tokens available after refilling.
    pub fn available(&mut self) -> f64 {
        self.available_at(Instant::now())
    }

    /// Tokens available at `now`, after refilling.
    pub fn available_at(&mut self, now: Instant) -> f64 {
        self.refill_at(now);
        self.tokens
    }
}

/// Configuration structure for creating a `TokenBucket`.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucketConfig {
    /// Tokens added per second.
    pub refill_rate: f64,
    /// Maximum number of tokens the bucket can hold.
    pub capacity: f64,
    /// Tokens available when the bucket is created.
    pub initial_tokens: f64,
}

impl TokenBucketConfig {
    /// Creates a new configuration instance.
    pub fn new(refill_rate: f64, capacity: f64, initial_tokens: f64) -> Self {
        Self {
            refill_rate,
            capacity,
            initial_tokens,
        }
    }

    /// Configuration for a bucket that starts full.
    pub fn full(refill_rate: f64, capacity: f64) -> Self {
        Self::new(refill_rate, capacity, capacity)
    }
}

impl From<TokenBucketConfig> for TokenBucket {
    /// Converts a `TokenBucketConfig` into a `TokenBucket` instance.
    ///
    /// # Panics
    /// Panics under the same conditions as [`TokenBucket::new`]. It is
    /// intended for validated or hardcoded input.
    ///
    /// ```
    /// use rate_guard_limiter::cores::{TokenBucket, TokenBucketConfig};
    ///
    /// let bucket: TokenBucket = TokenBucketConfig::full(10.0, 10.0).into();
    /// assert_eq!(bucket.capacity(), 10.0);
    /// ```
    #[inline(always)]
    fn from(config: TokenBucketConfig) -> Self {
        TokenBucket::new(config.refill_rate, config.capacity, config.initial_tokens)
    }
}

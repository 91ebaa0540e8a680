//! Public rate limiter facade.
//!
//! [`RateLimiter`] wraps a [`TokenBucket`] and an optional [`CallTracker`]
//! behind one mutex and offers blocking, non-blocking and async acquisition
//! on top of a single consume primitive.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{DeprecationPolicy, RateLimiterConfig, RateSpec};
use crate::cores::{CallStats, CallTracker, TokenBucket};
use crate::error::{RateLimiterError, Result};

/// Shortest sleep between retries of a blocked acquisition.
const MIN_RETRY_SLEEP: Duration = Duration::from_millis(1);
/// Longest sleep between retries, so waiters notice tokens freed by refill
/// soon after they appear.
const MAX_RETRY_SLEEP: Duration = Duration::from_millis(100);

/// Everything guarded by the limiter's mutex.
struct LimiterState {
    bucket: TokenBucket,
    tracker: Option<CallTracker>,
}

struct Shared {
    state: Mutex<LimiterState>,
    refill_rate: f64,
    capacity: f64,
    unlimited: bool,
    tracking: bool,
}

/// Outcome of one acquisition step.
enum Attempt {
    /// Token consumed after waiting the given time since the acquisition began.
    Acquired(Duration),
    /// No token yet; the step already slept and the caller should retry.
    Retry,
    /// The deadline passed without a token.
    TimedOut,
}

/// Thread-safe token bucket rate limiter.
///
/// Each acquisition consumes one token. Tokens refill continuously at the
/// configured rate up to the bucket capacity. Clones share the same bucket,
/// so a limiter can be handed to as many threads and tasks as needed.
///
/// # Acquisition paths
///
/// - [`try_acquire`](Self::try_acquire): never waits
/// - [`acquire`](Self::acquire): blocks the current thread, optionally with a timeout
/// - [`async_try_acquire`](Self::async_try_acquire) /
///   [`async_acquire`](Self::async_acquire): suspend the calling task while the
///   work runs on a worker thread (feature `async`)
/// - [`permit`](Self::permit) / [`async_permit`](Self::async_permit) and
///   [`run`](Self::run) / [`run_async`](Self::run_async): scoped forms that
///   only enter the protected block once a token is secured
///
/// Every path funnels through the same consume step, which also records the
/// call when tracking is enabled, so each successful acquisition is counted
/// exactly once.
///
/// # Ordering
///
/// Waiters are not queued. Whichever retry first observes a whole token wins.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use rate_guard_limiter::RateLimiter;
///
/// // 2 calls per second, bucket starts full
/// let limiter = RateLimiter::per_second(2).unwrap();
///
/// assert!(limiter.try_acquire());
/// assert!(limiter.try_acquire());
/// assert!(!limiter.try_acquire());
///
/// // Blocks roughly half a second for the next token
/// assert!(limiter.acquire(Some(Duration::from_secs(2))));
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

impl RateLimiter {
    /// Builds a limiter from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument [`RateLimiterError`] when the limit, period
    /// or legacy rate is not positive, when the initial tokens fall outside
    /// `0..=capacity`, or when the history window is zero.
    pub fn new(config: RateLimiterConfig) -> Result<Self> {
        let bucket = match config.validate()? {
            Some(bucket) => bucket,
            None => return Ok(Self::build(TokenBucket::unlimited(), &config)),
        };

        if matches!(config.rate, RateSpec::CallsPerSecond(_))
            && config.deprecation == DeprecationPolicy::Warn
        {
            tracing::warn!(
                "the calls-per-second rate form is deprecated; use a per-period rate instead"
            );
        }

        tracing::debug!(
            refill_rate = bucket.refill_rate,
            capacity = bucket.capacity,
            initial_tokens = bucket.initial_tokens,
            track_calls = config.track_calls,
            "rate limiter created"
        );

        Ok(Self::build(bucket.into(), &config))
    }

    /// `limit` calls per `period`, starting full.
    pub fn per_period(limit: u64, period: Duration) -> Result<Self> {
        Self::new(RateLimiterConfig::per_period(limit, period))
    }

    /// `limit` calls per second, starting full.
    pub fn per_second(limit: u64) -> Result<Self> {
        Self::new(RateLimiterConfig::per_second(limit))
    }

    /// Legacy form: `max_calls_per_second` is used as both rate and capacity.
    pub fn calls_per_second(
        max_calls_per_second: f64,
        deprecation: DeprecationPolicy,
    ) -> Result<Self> {
        Self::new(
            RateLimiterConfig::calls_per_second(max_calls_per_second).with_deprecation(deprecation),
        )
    }

    /// A limiter that grants every acquisition, without tracking.
    pub fn unlimited() -> Self {
        Self::build(TokenBucket::unlimited(), &RateLimiterConfig::unlimited())
    }

    /// A limiter that grants every acquisition and tracks calls.
    pub fn unlimited_tracked() -> Self {
        Self::build(
            TokenBucket::unlimited(),
            &RateLimiterConfig::unlimited().with_tracking(true),
        )
    }

    fn build(bucket: TokenBucket, config: &RateLimiterConfig) -> Self {
        let tracker = config
            .track_calls
            .then(|| CallTracker::new(config.history_window));

        RateLimiter {
            shared: Arc::new(Shared {
                refill_rate: bucket.refill_rate(),
                capacity: bucket.capacity(),
                unlimited: bucket.is_unlimited(),
                tracking: tracker.is_some(),
                state: Mutex::new(LimiterState { bucket, tracker }),
            }),
        }
    }

    /// Tokens added per second.
    pub fn rate(&self) -> f64 {
        self.shared.refill_rate
    }

    pub fn capacity(&self) -> f64 {
        self.shared.capacity
    }

    pub fn is_unlimited(&self) -> bool {
        self.shared.unlimited
    }

    pub fn is_tracking(&self) -> bool {
        self.shared.tracking
    }

    /// Tokens currently available, after refilling.
    pub fn available_tokens(&self) -> f64 {
        self.shared.state.lock().bucket.available()
    }

    /// Takes a token if one is available right now.
    ///
    /// Never sleeps. A successful call is tracked with zero delay.
    pub fn try_acquire(&self) -> bool {
        self.consume_tracked(None).is_some()
    }

    /// Takes a token, blocking the current thread until one is available.
    ///
    /// With `timeout: None` the call waits as long as it takes. Otherwise it
    /// gives up once `timeout` has elapsed and returns `false`. The lock is
    /// never held while sleeping.
    pub fn acquire(&self, timeout: Option<Duration>) -> bool {
        let started = Instant::now();
        let deadline = timeout.and_then(|timeout| started.checked_add(timeout));

        loop {
            match self.attempt(started, deadline) {
                Attempt::Acquired(_) => return true,
                Attempt::Retry => continue,
                Attempt::TimedOut => {
                    tracing::debug!(?timeout, "rate limiter acquisition timed out");
                    return false;
                }
            }
        }
    }

    /// Blocks until a token is secured and returns a scope guard for it.
    ///
    /// The token is spent when the permit is created; dropping the permit
    /// gives nothing back.
    pub fn permit(&self) -> Permit {
        let started = Instant::now();
        loop {
            if let Attempt::Acquired(waited) = self.attempt(started, None) {
                return Permit { waited };
            }
        }
    }

    /// Runs `f` once a token is secured.
    pub fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _permit = self.permit();
        f()
    }

    /// Consumes one token and records the call in a single critical section.
    ///
    /// `started` is when the caller began waiting; `None` records zero delay.
    fn consume_tracked(&self, started: Option<Instant>) -> Option<Duration> {
        let waited = {
            let mut state = self.shared.state.lock();
            let now = Instant::now();
            if !state.bucket.try_consume_one_at(now) {
                return None;
            }

            let waited = started.map_or(Duration::ZERO, |started| {
                now.saturating_duration_since(started)
            });
            if let Some(tracker) = state.tracker.as_mut() {
                tracker.record_at(now, waited);
            }
            waited
        };

        tracing::trace!(?waited, "rate limiter token acquired");
        Some(waited)
    }

    /// One step of a blocking acquisition: consume, or sleep until the next
    /// token is due (bounded by the deadline) with the lock released.
    fn attempt(&self, started: Instant, deadline: Option<Instant>) -> Attempt {
        if let Some(waited) = self.consume_tracked(Some(started)) {
            return Attempt::Acquired(waited);
        }

        let now = Instant::now();
        let remaining = match deadline {
            Some(deadline) => match deadline.checked_duration_since(now) {
                Some(remaining) if !remaining.is_zero() => Some(remaining),
                _ => return Attempt::TimedOut,
            },
            None => None,
        };

        let until_available = {
            let mut state = self.shared.state.lock();
            state.bucket.time_until_available_at(now)
        };
        let sleep = until_available.clamp(MIN_RETRY_SLEEP, MAX_RETRY_SLEEP);
        let sleep = remaining.map_or(sleep, |remaining| sleep.min(remaining));

        thread::sleep(sleep);
        Attempt::Retry
    }

    fn with_tracker<T>(&self, f: impl FnOnce(&mut CallTracker, f64) -> Result<T>) -> Result<T> {
        let mut state = self.shared.state.lock();
        let refill_rate = state.bucket.refill_rate();
        match state.tracker.as_mut() {
            Some(tracker) => f(tracker, refill_rate),
            None => Err(RateLimiterError::TrackingDisabled),
        }
    }

    /// Total successful acquisitions since tracking started or was reset.
    pub fn call_count(&self) -> Result<u64> {
        self.with_tracker(|tracker, _| Ok(tracker.call_count()))
    }

    /// Usage statistics snapshot.
    pub fn stats(&self) -> Result<CallStats> {
        self.with_tracker(|tracker, refill_rate| Ok(tracker.stats(refill_rate)))
    }

    /// Clears the call history and restarts tracking now.
    pub fn reset_call_count(&self) -> Result<()> {
        self.with_tracker(|tracker, _| {
            tracker.reset();
            Ok(())
        })?;
        tracing::debug!("rate limiter call tracking reset");
        Ok(())
    }

    /// Calls made within the last `window`.
    ///
    /// # Errors
    ///
    /// [`RateLimiterError::TrackingDisabled`] without tracking,
    /// [`RateLimiterError::InvalidWindow`] for a zero window.
    pub fn calls_in_window(&self, window: Duration) -> Result<usize> {
        self.with_tracker(|tracker, _| tracker.calls_in_window(window))
    }

    /// Percentage of the allowed call volume used within the last `window`.
    ///
    /// Meaningless for unlimited limiters, where it always reads `0.0`.
    ///
    /// # Errors
    ///
    /// Same as [`calls_in_window`](Self::calls_in_window).
    pub fn get_efficiency(&self, window: Duration) -> Result<f64> {
        self.with_tracker(|tracker, refill_rate| tracker.efficiency(window, refill_rate))
    }
}

#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
impl RateLimiter {
    /// Async form of [`try_acquire`](Self::try_acquire).
    ///
    /// The lock is taken on a worker thread, never on the executor thread.
    pub async fn async_try_acquire(&self) -> bool {
        let limiter = self.clone();
        crate::runtime::offload(move || limiter.try_acquire())
            .await
            .unwrap_or(false)
    }

    /// Async form of [`acquire`](Self::acquire).
    ///
    /// Each consume-or-sleep step runs on a worker thread while the calling
    /// task is suspended, so the executor keeps running other tasks. Shares
    /// the bucket and the tracking path with the blocking methods.
    pub async fn async_acquire(&self, timeout: Option<Duration>) -> bool {
        let started = Instant::now();
        let deadline = timeout.and_then(|timeout| started.checked_add(timeout));

        loop {
            let limiter = self.clone();
            match crate::runtime::offload(move || limiter.attempt(started, deadline)).await {
                Some(Attempt::Acquired(_)) => return true,
                Some(Attempt::Retry) => continue,
                Some(Attempt::TimedOut) => {
                    tracing::debug!(?timeout, "rate limiter acquisition timed out");
                    return false;
                }
                None => return false,
            }
        }
    }

    /// Async form of [`permit`](Self::permit).
    ///
    /// If the runtime shuts down while waiting, the future never resolves, so
    /// a protected block cannot run without a token.
    pub async fn async_permit(&self) -> Permit {
        let started = Instant::now();

        loop {
            let limiter = self.clone();
            match crate::runtime::offload(move || limiter.attempt(started, None)).await {
                Some(Attempt::Acquired(waited)) => return Permit { waited },
                Some(_) => continue,
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Awaits `f()` once a token is secured.
    pub async fn run_async<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future,
    {
        let _permit = self.async_permit().await;
        f().await
    }
}

impl TryFrom<RateLimiterConfig> for RateLimiter {
    type Error = RateLimiterError;

    fn try_from(config: RateLimiterConfig) -> Result<Self> {
        RateLimiter::new(config)
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.shared.refill_rate)
            .field("capacity", &self.shared.capacity)
            .field("unlimited", &self.shared.unlimited)
            .field("tracking", &self.shared.tracking)
            .finish()
    }
}

/// Proof that a token was secured for the current scope.
///
/// Returned by [`RateLimiter::permit`] and [`RateLimiter::async_permit`].
/// Dropping it has no effect on the bucket.
#[derive(Debug)]
#[must_use = "a permit marks the scope a token was acquired for"]
pub struct Permit {
    waited: Duration,
}

impl Permit {
    /// Time spent waiting before the token was secured.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

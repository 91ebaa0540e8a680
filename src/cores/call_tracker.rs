use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::{RateLimiterError, Result};

/// Default retention for per-call history.
pub const DEFAULT_HISTORY_WINDOW: Duration = Duration::from_secs(3600);

/// Window used for the efficiency figure of a [`CallStats`] snapshot.
pub const DEFAULT_EFFICIENCY_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of limiter usage.
#[derive(Debug, Clone, PartialEq)]
pub struct CallStats {
    /// Successful acquisitions since tracking started or was last reset.
    pub total_calls: u64,
    /// Sum of the waits that preceded every recorded call.
    pub total_delay: Duration,
    /// `total_delay / total_calls`, zero when no calls were made.
    pub average_delay: Duration,
    /// Longest single wait, zero when no calls were made.
    pub max_delay: Duration,
    /// Calls per second since `tracking_start_time`.
    pub calls_per_second_average: f64,
    /// Share of the allowed rate used over [`DEFAULT_EFFICIENCY_WINDOW`], capped at 100.
    pub efficiency_percentage: f64,
    /// When tracking started or was last reset.
    pub tracking_start_time: DateTime<Utc>,
    /// When the most recent call was recorded.
    pub last_call_time: Option<DateTime<Utc>>,
}

/// Bounded record of successful acquisitions.
///
/// Keeps the instant and preceding wait of every call made within the last
/// `history_window`, plus counters that are never pruned. Like
/// [`TokenBucket`](super::TokenBucket) it carries no lock; the limiter mutates
/// it under the same mutex as the bucket so both always describe the same
/// instant.
#[derive(Debug, Clone)]
pub struct CallTracker {
    history_window: Duration,
    /// Call instants, oldest first
    timestamps: VecDeque<Instant>,
    /// Wait before each call, parallel to `timestamps`
    delays: VecDeque<Duration>,
    call_count: u64,
    total_delay: Duration,
    max_delay: Duration,
    last_call_time: Option<DateTime<Utc>>,
    tracking_start: Instant,
    tracking_start_time: DateTime<Utc>,
}

impl CallTracker {
    /// Creates a tracker whose statistics start now.
    ///
    /// # Panics
    ///
    /// Panics if `history_window` is zero.
    pub fn new(history_window: Duration) -> Self {
        Self::new_at(history_window, Instant::now())
    }

    /// Creates a tracker whose statistics start at `now`.
    ///
    /// # Panics
    ///
    /// Panics if `history_window` is zero.
    pub fn new_at(history_window: Duration, now: Instant) -> Self {
        assert!(!history_window.is_zero(), "history_window must be greater than 0");

        CallTracker {
            history_window,
            timestamps: VecDeque::new(),
            delays: VecDeque::new(),
            call_count: 0,
            total_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            last_call_time: None,
            tracking_start: now,
            tracking_start_time: Utc::now(),
        }
    }

    pub fn history_window(&self) -> Duration {
        self.history_window
    }

    /// Total calls recorded; never pruned.
    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Number of calls still held in the history window.
    pub fn retained_calls(&self) -> usize {
        self.timestamps.len()
    }

    /// Waits of the calls still held in the history window, oldest first.
    pub fn recent_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.delays.iter().copied()
    }

    pub fn last_call_time(&self) -> Option<DateTime<Utc>> {
        self.last_call_time
    }

    pub fn tracking_start_time(&self) -> DateTime<Utc> {
        self.tracking_start_time
    }

    /// Records a call made now after waiting `delay`.
    pub fn record(&mut self, delay: Duration) {
        self.record_at(Instant::now(), delay)
    }

    /// Records a call made at `now` after waiting `delay`, then drops history
    /// older than the window.
    pub fn record_at(&mut self, now: Instant, delay: Duration) {
        self.timestamps.push_back(now);
        self.delays.push_back(delay);
        self.call_count += 1;
        self.total_delay = self.total_delay.saturating_add(delay);
        self.max_delay = self.max_delay.max(delay);
        self.last_call_time = Some(self.wall_clock_at(now));

        self.prune_at(now);
    }

    /// Number of calls made within `window` of now.
    pub fn calls_in_window(&self, window: Duration) -> Result<usize> {
        self.calls_in_window_at(Instant::now(), window)
    }

    /// Number of calls made within `window` before `now`.
    ///
    /// Only calls still held in the history window can be counted.
    ///
    /// # Returns
    /// * `Ok(count)` - calls with a timestamp at or after `now - window`
    /// * `Err(RateLimiterError::InvalidWindow)` - `window` is zero
    pub fn calls_in_window_at(&self, now: Instant, window: Duration) -> Result<usize> {
        if window.is_zero() {
            return Err(RateLimiterError::InvalidWindow);
        }
        Ok(self.count_since(now.checked_sub(window)))
    }

    /// Percentage of the allowed call volume used within `window` of now.
    pub fn efficiency(&self, window: Duration, refill_rate: f64) -> Result<f64> {
        self.efficiency_at(Instant::now(), window, refill_rate)
    }

    /// Percentage of the allowed call volume used within `window` before `now`.
    ///
    /// Computed as `calls_in_window / (refill_rate * window) * 100`. A capped
    /// bucket keeps this within `0..=100` in steady state. With an infinite
    /// `refill_rate` (unlimited limiters) the figure is meaningless and reads
    /// as `0.0`.
    pub fn efficiency_at(&self, now: Instant, window: Duration, refill_rate: f64) -> Result<f64> {
        let calls = self.calls_in_window_at(now, window)?;
        let max_possible = refill_rate * window.as_secs_f64();
        if max_possible > 0.0 {
            Ok(calls as f64 / max_possible * 100.0)
        } else {
            Ok(0.0)
        }
    }

    /// Statistics snapshot taken now.
    pub fn stats(&self, refill_rate: f64) -> CallStats {
        self.stats_at(Instant::now(), refill_rate)
    }

    /// Statistics snapshot taken at `now`.
    pub fn stats_at(&self, now: Instant, refill_rate: f64) -> CallStats {
        let average_delay = match u32::try_from(self.call_count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total_delay / count,
            Err(_) => Duration::try_from_secs_f64(
                self.total_delay.as_secs_f64() / self.call_count as f64,
            )
            .unwrap_or(Duration::MAX),
        };

        let elapsed = now.saturating_duration_since(self.tracking_start).as_secs_f64();
        let calls_per_second_average = if elapsed > 0.0 {
            self.call_count as f64 / elapsed
        } else {
            0.0
        };

        let efficiency_percentage = self
            .efficiency_at(now, DEFAULT_EFFICIENCY_WINDOW, refill_rate)
            .unwrap_or(0.0)
            .min(100.0);

        CallStats {
            total_calls: self.call_count,
            total_delay: self.total_delay,
            average_delay,
            max_delay: self.max_delay,
            calls_per_second_average,
            efficiency_percentage,
            tracking_start_time: self.tracking_start_time,
            last_call_time: self.last_call_time,
        }
    }

    /// Clears all history and counters and restarts tracking now.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now())
    }

    /// Clears all history and counters and restarts tracking at `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.timestamps.clear();
        self.delays.clear();
        self.call_count = 0;
        self.total_delay = Duration::ZERO;
        self.max_delay = Duration::ZERO;
        self.last_call_time = None;
        self.tracking_start = now;
        self.tracking_start_time = Utc::now();
    }

    fn count_since(&self, cutoff: Option<Instant>) -> usize {
        match cutoff {
            Some(cutoff) => {
                let older = self.timestamps.partition_point(|ts| *ts < cutoff);
                self.timestamps.len() - older
            }
            // The window reaches back past the start of the monotonic clock.
            None => self.timestamps.len(),
        }
    }

    fn prune_at(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.history_window) else {
            return;
        };
        while self.timestamps.front().is_some_and(|ts| *ts < cutoff) {
            self.timestamps.pop_front();
            self.delays.pop_front();
        }
    }

    fn wall_clock_at(&self, now: Instant) -> DateTime<Utc> {
        let since_start = now.saturating_duration_since(self.tracking_start);
        chrono::Duration::from_std(since_start)
            .ok()
            .and_then(|offset| self.tracking_start_time.checked_add_signed(offset))
            .unwrap_or(self.tracking_start_time)
    }
}

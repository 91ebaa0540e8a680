use std::time::{Duration, Instant};

use chrono::Utc;
use rate_guard_limiter::cores::{CallTracker, DEFAULT_HISTORY_WINDOW};
use rate_guard_limiter::RateLimiterError;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[test]
#[should_panic(expected = "history_window must be greater than 0")]
fn test_new_with_zero_history_window() {
    CallTracker::new(Duration::ZERO);
}

#[test]
fn test_empty_tracker() {
    let start = Instant::now();
    let tracker = CallTracker::new_at(DEFAULT_HISTORY_WINDOW, start);

    assert_eq!(tracker.call_count(), 0);
    assert_eq!(tracker.retained_calls(), 0);
    assert_eq!(tracker.last_call_time(), None);

    let stats = tracker.stats_at(start + secs(5), 2.0);
    assert_eq!(stats.total_calls, 0);
    assert_eq!(stats.total_delay, Duration::ZERO);
    assert_eq!(stats.average_delay, Duration::ZERO);
    assert_eq!(stats.max_delay, Duration::ZERO);
    assert_eq!(stats.calls_per_second_average, 0.0);
    assert_eq!(stats.efficiency_percentage, 0.0);
    assert_eq!(stats.last_call_time, None);
}

#[test]
fn test_record_updates_counters() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);

    tracker.record_at(start + ms(10), ms(100));
    tracker.record_at(start + ms(20), ms(300));

    assert_eq!(tracker.call_count(), 2);
    assert_eq!(tracker.retained_calls(), 2);
    assert_eq!(tracker.recent_delays().collect::<Vec<_>>(), vec![ms(100), ms(300)]);
    assert!(tracker.last_call_time().is_some());
}

#[test]
fn test_history_is_pruned_but_count_is_not() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(10), start);

    tracker.record_at(start, ms(0));
    tracker.record_at(start + secs(5), ms(0));
    // Cutoff becomes start + 2s, dropping the first call
    tracker.record_at(start + secs(12), ms(0));

    assert_eq!(tracker.call_count(), 3);
    assert_eq!(tracker.retained_calls(), 2);
    assert_eq!(tracker.recent_delays().count(), 2);

    // Everything older than start + 20s goes
    tracker.record_at(start + secs(30), ms(0));
    assert_eq!(tracker.call_count(), 4);
    assert_eq!(tracker.retained_calls(), 1);
}

#[test]
fn test_calls_in_window() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);

    tracker.record_at(start, ms(0));
    tracker.record_at(start + secs(1), ms(0));
    tracker.record_at(start + secs(2), ms(0));

    // Window boundary is inclusive
    assert_eq!(tracker.calls_in_window_at(start + secs(2), secs(1)), Ok(2));
    assert_eq!(tracker.calls_in_window_at(start + secs(2), secs(2)), Ok(3));
    assert_eq!(tracker.calls_in_window_at(start + secs(10), secs(5)), Ok(0));
}

#[test]
fn test_calls_in_window_rejects_zero_window() {
    let tracker = CallTracker::new(secs(60));
    assert_eq!(
        tracker.calls_in_window(Duration::ZERO),
        Err(RateLimiterError::InvalidWindow)
    );
    assert_eq!(
        tracker.efficiency(Duration::ZERO, 1.0),
        Err(RateLimiterError::InvalidWindow)
    );
}

#[test]
fn test_efficiency() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);

    for i in 0..5 {
        tracker.record_at(start + secs(i), ms(0));
    }

    // 5 calls out of a possible 2/s * 10s = 20
    assert_eq!(tracker.efficiency_at(start + secs(5), secs(10), 2.0), Ok(25.0));
}

#[test]
fn test_efficiency_with_infinite_rate_reads_zero() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);
    tracker.record_at(start, ms(0));

    assert_eq!(
        tracker.efficiency_at(start, secs(10), f64::INFINITY),
        Ok(0.0)
    );
}

#[test]
fn test_stats_delays() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);

    tracker.record_at(start + secs(1), ms(100));
    tracker.record_at(start + secs(2), ms(300));

    let stats = tracker.stats_at(start + secs(4), 1.0);
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.total_delay, ms(400));
    assert_eq!(stats.max_delay, ms(300));
    let average_error = stats.average_delay.as_secs_f64() - 0.2;
    assert!(average_error.abs() < 1e-6, "average delay {:?}", stats.average_delay);
    assert_eq!(stats.calls_per_second_average, 0.5);
}

#[test]
fn test_aggregate_delays_survive_pruning() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(1), start);

    tracker.record_at(start, ms(500));
    tracker.record_at(start + secs(10), ms(100));

    assert_eq!(tracker.retained_calls(), 1);
    let stats = tracker.stats_at(start + secs(10), 1.0);
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.total_delay, ms(600));
    assert_eq!(stats.max_delay, ms(500));
}

#[test]
fn test_stats_with_saturated_total_delay() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);

    tracker.record_at(start, Duration::MAX);
    tracker.record_at(start, ms(1));

    let stats = tracker.stats_at(start, 1.0);
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.total_delay, Duration::MAX);
    assert_eq!(stats.max_delay, Duration::MAX);
    assert_eq!(stats.average_delay, Duration::MAX / 2);
}

#[test]
fn test_stats_efficiency_is_capped() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(3600), start);

    for _ in 0..10 {
        tracker.record_at(start + secs(1), ms(0));
    }

    // 10 calls against 0.01/s * 60s = 0.6 allowed
    let stats = tracker.stats_at(start + secs(2), 0.01);
    assert_eq!(stats.efficiency_percentage, 100.0);
}

#[test]
fn test_stats_at_tracking_start() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);
    tracker.record_at(start, ms(0));

    // No time has elapsed, so no average rate
    assert_eq!(tracker.stats_at(start, 1.0).calls_per_second_average, 0.0);
}

#[test]
fn test_reset() {
    let start = Instant::now();
    let mut tracker = CallTracker::new_at(secs(60), start);
    tracker.record_at(start + secs(1), ms(250));
    tracker.record_at(start + secs(2), ms(250));

    tracker.reset_at(start + secs(3));

    assert_eq!(tracker.call_count(), 0);
    assert_eq!(tracker.retained_calls(), 0);
    assert_eq!(tracker.last_call_time(), None);

    let stats = tracker.stats_at(start + secs(3), 1.0);
    assert_eq!(stats.total_calls, 0);
    assert_eq!(stats.total_delay, Duration::ZERO);
    assert_eq!(stats.max_delay, Duration::ZERO);
    let since_reset = Utc::now() - stats.tracking_start_time;
    assert!(since_reset.num_milliseconds().abs() < 1000);

    // Rate is measured from the reset point
    tracker.record_at(start + secs(4), ms(0));
    assert_eq!(tracker.stats_at(start + secs(5), 1.0).calls_per_second_average, 0.5);
}

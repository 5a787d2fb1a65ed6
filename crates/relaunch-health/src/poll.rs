//! Bounded polling loop.

use std::future::Future;
use std::time::Duration;

use relaunch_core::{HealthCheckResult, HealthTarget};
use tracing::{debug, warn};

use crate::clock::Clock;

/// Fixed-interval polling with an attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on time spent sleeping inside one polling window.
    pub fn window(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Every observation made during one polling window.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub target: HealthTarget,
    pub results: Vec<HealthCheckResult>,
}

impl PollReport {
    /// Whether the final observation passed.
    pub fn passed(&self) -> bool {
        self.results.last().is_some_and(|r| r.passed)
    }

    pub fn attempts(&self) -> u32 {
        self.results.len() as u32
    }
}

/// Probe `target` until it passes or `policy.max_attempts` probes have failed.
///
/// The first probe runs immediately; `policy.interval` is slept between
/// consecutive probes, never after the last one. `probe` receives the
/// 1-based attempt number.
pub async fn poll_until_healthy<F, Fut>(
    target: HealthTarget,
    policy: PollPolicy,
    clock: &dyn Clock,
    mut probe: F,
) -> PollReport
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut results = Vec::new();

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            clock.sleep(policy.interval).await;
        }

        let passed = probe(attempt).await;
        debug!(%target, attempt, max = policy.max_attempts, passed, "health probe");
        results.push(HealthCheckResult {
            target: target.clone(),
            attempt_number: attempt,
            passed,
            observed_at: clock.now(),
        });

        if passed {
            break;
        }
    }

    let report = PollReport { target, results };
    if !report.passed() {
        warn!(
            target = %report.target,
            attempts = report.attempts(),
            "health check did not pass within its window"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn api() -> HealthTarget {
        HealthTarget::Service("api".to_string())
    }

    #[tokio::test]
    async fn passes_on_first_attempt_without_sleeping() {
        let clock = ManualClock::default();
        let policy = PollPolicy::new(Duration::from_secs(2), 30);

        let report = poll_until_healthy(api(), policy, &clock, |_| async { true }).await;

        assert!(report.passed());
        assert_eq!(report.attempts(), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn passes_after_some_failures() {
        let clock = ManualClock::default();
        let policy = PollPolicy::new(Duration::from_secs(2), 30);

        let report =
            poll_until_healthy(api(), policy, &clock, |attempt| async move { attempt >= 4 }).await;

        assert!(report.passed());
        assert_eq!(report.attempts(), 4);
        assert_eq!(clock.elapsed(), Duration::from_secs(6));
        let passes: Vec<bool> = report.results.iter().map(|r| r.passed).collect();
        assert_eq!(passes, [false, false, false, true]);
    }

    #[tokio::test]
    async fn never_exceeds_attempt_ceiling() {
        let clock = ManualClock::default();
        let policy = PollPolicy::new(Duration::from_secs(2), 30);
        let mut calls = 0u32;

        let report = poll_until_healthy(api(), policy, &clock, |_| {
            calls += 1;
            async { false }
        })
        .await;

        assert!(!report.passed());
        assert_eq!(calls, 30);
        assert_eq!(report.attempts(), 30);
        assert_eq!(clock.sleep_count(), 29);
        assert_eq!(clock.elapsed(), policy.window());
        assert_eq!(policy.window(), Duration::from_secs(58));
    }

    #[tokio::test]
    async fn attempt_numbers_are_one_based_and_stamped() {
        let clock = ManualClock::starting_at(500);
        let policy = PollPolicy::new(Duration::from_secs(10), 3);

        let report = poll_until_healthy(api(), policy, &clock, |_| async { false }).await;

        let numbers: Vec<u32> = report.results.iter().map(|r| r.attempt_number).collect();
        assert_eq!(numbers, [1, 2, 3]);
        let stamps: Vec<u64> = report.results.iter().map(|r| r.observed_at).collect();
        assert_eq!(stamps, [500, 510, 520]);
    }

    #[tokio::test]
    async fn zero_attempts_never_passes() {
        let clock = ManualClock::default();
        let policy = PollPolicy::new(Duration::from_secs(1), 0);
        let report = poll_until_healthy(api(), policy, &clock, |_| async { true }).await;
        assert!(!report.passed());
        assert_eq!(report.attempts(), 0);
    }
}

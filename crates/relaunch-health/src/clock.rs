//! Time source for polling loops and back-off delays.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Wall-clock reads and suspension, injectable for tests.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u64;

    /// Suspend the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// The real clock: `SystemTime` plus `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> u64 {
        relaunch_core::epoch_secs()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately and advances time instead.
///
/// Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<ManualInner>,
}

#[derive(Debug, Default)]
struct ManualInner {
    start_secs: u64,
    elapsed_ms: AtomicU64,
    sleeps: AtomicU32,
}

impl ManualClock {
    /// A clock whose `now()` starts at `start_secs`.
    pub fn starting_at(start_secs: u64) -> Self {
        Self {
            inner: Arc::new(ManualInner {
                start_secs,
                ..Default::default()
            }),
        }
    }

    /// Total virtual time spent sleeping.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.inner.elapsed_ms.load(Ordering::SeqCst))
    }

    /// Number of `sleep` calls made so far.
    pub fn sleep_count(&self) -> u32 {
        self.inner.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.inner.start_secs + self.elapsed().as_secs()
    }

    async fn sleep(&self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.inner.elapsed_ms.fetch_add(ms, Ordering::SeqCst);
        self.inner.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}

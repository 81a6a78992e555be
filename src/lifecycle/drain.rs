//! In-flight work tracking for graceful drains.
//!
//! # Responsibilities
//! - Count units of work (RPC calls) currently executing
//! - Refuse new work once closed
//! - Let a drain wait until the count reaches zero

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Tracks in-flight work for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct DrainTracker {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    closed: AtomicBool,
    idle: Notify,
}

impl DrainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new unit of work. Returns `None` once the tracker is closed.
    pub fn track(&self) -> Option<DrainGuard> {
        // Count first so a concurrent drain cannot observe zero between the
        // closed check and the increment.
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        let guard = DrainGuard {
            inner: Arc::clone(&self.inner),
        };
        if self.inner.closed.load(Ordering::SeqCst) {
            return None;
        }
        Some(guard)
    }

    /// Stop accepting new work. Idempotent.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Get current in-flight count.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no work is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard that tracks one unit of work.
/// Decrements the active count when dropped.
#[derive(Debug)]
pub struct DrainGuard {
    inner: Arc<Inner>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tracker_counts() {
        let tracker = DrainTracker::new();
        assert_eq!(tracker.active(), 0);

        let guard1 = tracker.track().unwrap();
        let guard2 = tracker.track().unwrap();
        assert_eq!(tracker.active(), 2);

        drop(guard1);
        assert_eq!(tracker.active(), 1);

        drop(guard2);
        assert_eq!(tracker.active(), 0);
    }

    #[test]
    fn closed_tracker_refuses_work() {
        let tracker = DrainTracker::new();
        tracker.close();
        assert!(tracker.track().is_none());
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_empty() {
        let tracker = DrainTracker::new();
        tokio::time::timeout(Duration::from_millis(10), tracker.wait_idle())
            .await
            .expect("no work in flight");
    }

    #[tokio::test]
    async fn wait_idle_waits_for_last_guard() {
        let tracker = DrainTracker::new();
        let guard = tracker.track().unwrap();

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait_idle().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait should complete")
            .expect("task should not panic");
    }
}

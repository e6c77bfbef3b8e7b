//! Exponential backoff without jitter.
//!
//! `next = current * multiplier`, no jitter. Callers that retry concurrently
//! against the same backend wake up in lockstep.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Stateless policy step: the wait that follows `current`.
///
/// Saturates at `Duration::MAX` instead of overflowing.
pub fn next_wait(current: Duration, multiplier: f64) -> Duration {
    let secs = current.as_secs_f64() * multiplier;
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// The wait counter of one logical call. Never shared between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    current: Duration,
}

impl BackoffState {
    pub fn new(initial: Duration) -> Self {
        Self { current: initial }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Grows the wait and returns the new value.
    pub fn advance(&mut self, multiplier: f64) -> Duration {
        self.current = next_wait(self.current, multiplier);
        self.current
    }
}

/// Why the dispatcher is about to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Courtesy delay before a network attempt, to stay under provider throttling.
    Pacing,
    /// Delay after a retryable failure.
    Backoff,
}

/// Every intentional wait in the dispatch loop goes through this seam.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration, reason: WaitReason);
}

/// Default sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration, _reason: WaitReason) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Sleeper that returns immediately and remembers every requested wait.
///
/// Intended for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<(WaitReason, Duration)>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<(WaitReason, Duration)> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn waits_for(&self, reason: WaitReason) -> Vec<Duration> {
        self.waits()
            .into_iter()
            .filter(|(r, _)| *r == reason)
            .map(|(_, d)| d)
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration, reason: WaitReason) {
        if let Ok(mut w) = self.waits.lock() {
            w.push((reason, duration));
        }
    }
}

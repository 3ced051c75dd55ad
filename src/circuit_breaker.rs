use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// Reset period elapsed; the next call is a probe
    HalfOpen,
}

/// Tracks generator health so repeated failures skip straight to the local
/// fallback instead of waiting out a timeout on every request.
#[derive(Clone)]
pub struct CircuitBreaker {
    failures: Arc<AtomicU64>,
    opened_at: Arc<RwLock<Option<Instant>>>,
    reset_after: Duration,
    failure_threshold: u64,
}

impl CircuitBreaker {
    pub fn new(reset_after: Duration, failure_threshold: u64) -> Self {
        CircuitBreaker {
            failures: Arc::new(AtomicU64::new(0)),
            opened_at: Arc::new(RwLock::new(None)),
            reset_after,
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn state(&self) -> CircuitState {
        match *self.opened_at.read() {
            None => CircuitState::Closed,
            Some(at) if at.elapsed() >= self.reset_after => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
        }
    }

    /// True while calls should not be attempted
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Relaxed);
        *self.opened_at.write() = None;
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.failure_threshold {
            // A failed half-open probe restarts the reset period.
            *self.opened_at.write() = Some(Instant::now());
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Exponential backoff with up to 20% random jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        ExponentialBackoff {
            initial_delay_ms,
            max_delay_ms,
            multiplier: 2.0,
        }
    }

    /// Delay for attempt number (0-indexed), without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = (self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32)) as u64;
        delay.min(self.max_delay_ms)
    }

    /// Jittered delay, never above the cap
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let jitter = if base == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=base / 5)
        };
        Duration::from_millis((base + jitter).min(self.max_delay_ms))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(100, 2000)
    }
}

//! Interval functions used for retry and reconnection delays.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Computes the delay before the next attempt.
pub trait IntervalFunction: Send + Sync {
    /// Delay before the attempt following `attempt` failures (0-indexed).
    fn next_interval(&self, attempt: usize) -> Duration;
}

impl<I: IntervalFunction + ?Sized> IntervalFunction for Arc<I> {
    fn next_interval(&self, attempt: usize) -> Duration {
        (**self).next_interval(attempt)
    }
}

/// Same delay for every attempt.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a fixed interval.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `initial × multiplier^attempt`, optionally capped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff with a multiplier of 2.0 and no cap.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth multiplier.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the computed interval.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let secs = self.initial_interval.as_secs_f64() * factor;

        let interval = if secs.is_finite() && secs < u64::MAX as f64 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::MAX
        };

        match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        }
    }
}

/// Adds a uniformly distributed `[0, max_jitter)` delay on top of another
/// interval function.
#[derive(Debug, Clone)]
pub struct Jittered<I> {
    inner: I,
    max_jitter: Duration,
}

impl<I> Jittered<I> {
    /// Wraps `inner`, adding up to `max_jitter` to every interval.
    pub fn new(inner: I, max_jitter: Duration) -> Self {
        Self { inner, max_jitter }
    }

    /// Returns the jitter bound.
    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }
}

impl<I: IntervalFunction> IntervalFunction for Jittered<I> {
    fn next_interval(&self, attempt: usize) -> Duration {
        self.inner
            .next_interval(attempt)
            .saturating_add(random_jitter(self.max_jitter))
    }
}

/// Returns a random duration in `[0, max)`; zero when `max` is zero.
pub fn random_jitter(max: Duration) -> Duration {
    let bound = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    if bound == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..bound))
}

/// Closure-backed interval function.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Creates a function-based interval.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}

//! Per-provider throughput and concurrency control
//!
//! Two independent gates guard every external call: a continuously refilled
//! token bucket sized to the provider's requests-per-minute budget, and a
//! counting semaphore bounding simultaneous in-flight calls. A provider may
//! allow a high burst RPM but only a handful of parallel connections, so
//! both checks must pass to obtain a permit.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("local rate limit reached")]
    RateLimited,

    #[error("deadline passed while waiting for capacity")]
    DeadlineExceeded,
}

/// Continuously refilled token bucket. Capacity equals the per-minute
/// budget; refill rate is capacity / 60s.
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(requests_per_minute: u32) -> Self {
        let capacity = f64::from(requests_per_minute);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token, or report how long until one accrues
    fn take_or_wait(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec))
        }
    }

    fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }
}

/// Concurrency slot plus one spent rate token. The slot is returned when
/// the permit drops, on every exit path including cancellation; the token
/// is consumed for good, which is what makes it a rate limit.
pub struct RatePermit {
    _slot: OwnedSemaphorePermit,
}

/// One limiter instance per provider, shared across all jobs in flight
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, max_concurrent: usize) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(requests_per_minute)),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Non-blocking acquire. Callers that cannot wait use this and skip the
    /// attempt when it fails.
    pub fn try_acquire(&self) -> Result<RatePermit, AcquireError> {
        let slot = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| AcquireError::RateLimited)?;
        let taken = {
            let mut bucket = self.bucket.lock().expect("token bucket lock poisoned");
            bucket.take_or_wait(Instant::now()).is_ok()
        };
        if taken {
            Ok(RatePermit { _slot: slot })
        } else {
            // slot drops here, releasing the concurrency hold
            Err(AcquireError::RateLimited)
        }
    }

    /// Blocking acquire. Suspends until both gates pass or `deadline`
    /// arrives. Cancellation cannot leak the concurrency slot: the owned
    /// permit is dropped with the future.
    pub async fn wait_acquire(&self, deadline: Instant) -> Result<RatePermit, AcquireError> {
        let acquire = async {
            let slot = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("rate limiter semaphore closed");
            self.wait_for_token().await;
            RatePermit { _slot: slot }
        };
        tokio::time::timeout_at(deadline, acquire)
            .await
            .map_err(|_| AcquireError::DeadlineExceeded)
    }

    /// Consume one more rate token without touching the concurrency slot.
    /// Used before each retry call so the per-minute budget counts every
    /// external call, not just the first.
    pub async fn take_token(&self, deadline: Instant) -> Result<(), AcquireError> {
        tokio::time::timeout_at(deadline, self.wait_for_token())
            .await
            .map_err(|_| AcquireError::DeadlineExceeded)
    }

    async fn wait_for_token(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().expect("token bucket lock poisoned");
                match bucket.take_or_wait(Instant::now()) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available, for health snapshots
    pub fn tokens_available(&self) -> f64 {
        let mut bucket = self.bucket.lock().expect("token bucket lock poisoned");
        bucket.available(Instant::now())
    }

    /// Calls currently holding a concurrency slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_bounded_by_capacity() {
        let limiter = RateLimiter::new(5, 10);
        let mut permits = Vec::new();
        for _ in 0..5 {
            permits.push(limiter.try_acquire().unwrap());
        }
        // bucket drained: sixth call is refused without blocking
        assert_eq!(limiter.try_acquire().err(), Some(AcquireError::RateLimited));
    }

    #[tokio::test]
    async fn test_concurrency_cap_independent_of_tokens() {
        // plenty of tokens, but only two slots
        let limiter = RateLimiter::new(600, 2);
        let first = limiter.try_acquire().unwrap();
        let _second = limiter.try_acquire().unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(limiter.try_acquire().err(), Some(AcquireError::RateLimited));

        drop(first);
        assert_eq!(limiter.in_flight(), 1);
        assert!(limiter.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_permit_drop_releases_slot_exactly_once() {
        let limiter = RateLimiter::new(600, 1);
        {
            let _permit = limiter.try_acquire().unwrap();
            assert_eq!(limiter.in_flight(), 1);
        }
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_tokens_refill_continuously() {
        // 600 rpm = 10 tokens/sec
        let limiter = RateLimiter::new(600, 4);
        while limiter.try_acquire().is_ok() {}
        assert!(limiter.tokens_available() < 1.0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        // ~2.5 tokens accrued
        assert!(limiter.tokens_available() >= 1.0);
        assert!(limiter.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_wait_acquire_respects_deadline() {
        let limiter = RateLimiter::new(60, 1);
        // hold the only slot so the waiter can never pass the semaphore
        let _held = limiter.try_acquire().unwrap();

        let deadline = Instant::now() + Duration::from_millis(50);
        let started = Instant::now();
        let result = limiter.wait_acquire(deadline).await;
        assert_eq!(result.err(), Some(AcquireError::DeadlineExceeded));
        assert!(started.elapsed() >= Duration::from_millis(45));
        // the waiter's pending semaphore acquire was dropped, not leaked
        drop(_held);
        assert!(limiter.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_wait_acquire_wakes_when_slot_frees() {
        let limiter = Arc::new(RateLimiter::new(600, 1));
        let held = limiter.try_acquire().unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.wait_acquire(Instant::now() + Duration::from_secs(2)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(held);

        let permit = waiter.await.unwrap();
        assert!(permit.is_ok());
    }

    #[tokio::test]
    async fn test_take_token_paces_retries() {
        // 120 rpm = 2 tokens/sec; drain the burst first
        let limiter = RateLimiter::new(120, 4);
        while limiter.try_acquire().is_ok() {}

        let started = Instant::now();
        let deadline = started + Duration::from_secs(2);
        limiter.take_token(deadline).await.unwrap();
        // one token takes ~500ms to accrue from an empty bucket
        assert!(started.elapsed() >= Duration::from_millis(400));
    }
}

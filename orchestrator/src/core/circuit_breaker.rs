//! Per-provider failure isolation
//!
//! Finite state machine: `Closed` counts consecutive failures and opens at
//! the threshold; `Open` rejects all dispatch until the cooldown elapses;
//! the next admission after cooldown becomes the single half-open probe.
//! A probe success closes the circuit, a probe failure re-opens it with a
//! fresh cooldown. Only consecutive failures count; there is no decay.

use std::sync::Mutex;
use std::time::Duration;

use shared::BreakerState;
use tokio::time::Instant;
use tracing::{info, warn};

/// Dispatch decision handed back by `admit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Launch the worker. `probe` marks the single half-open test call.
    Dispatch { probe: bool },
    /// Provider is quarantined; finalize the attempt as skipped
    Reject,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed,
    Open { opened_at: Instant },
    HalfOpen { probe_in_flight: bool },
}

struct BreakerInner {
    state: State,
    consecutive_failures: u32,
}

/// One breaker instance per provider, shared across all jobs in flight
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            name,
            failure_threshold,
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: State::Closed,
                consecutive_failures: 0,
            }),
        }
    }

    /// Decide whether a new attempt may dispatch. The transition out of
    /// `Open` is lazy: the first admission after the cooldown becomes the
    /// half-open probe.
    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            State::Closed => Admission::Dispatch { probe: false },
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.cooldown {
                    info!("breaker {} cooled down, admitting half-open probe", self.name);
                    inner.state = State::HalfOpen { probe_in_flight: true };
                    Admission::Dispatch { probe: true }
                } else {
                    Admission::Reject
                }
            }
            State::HalfOpen { probe_in_flight } => {
                if probe_in_flight {
                    Admission::Reject
                } else {
                    inner.state = State::HalfOpen { probe_in_flight: true };
                    Admission::Dispatch { probe: true }
                }
            }
        }
    }

    /// A dispatched attempt finished with a provider success
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if let State::HalfOpen { .. } = inner.state {
            info!("breaker {} probe succeeded, closing circuit", self.name);
            inner.state = State::Closed;
        }
        inner.consecutive_failures = 0;
    }

    /// A dispatched attempt finished with a failure or timeout
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        match inner.state {
            State::Closed => {
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        "breaker {} opening after {} consecutive failures",
                        self.name, inner.consecutive_failures
                    );
                    inner.state = State::Open { opened_at: Instant::now() };
                }
            }
            State::HalfOpen { .. } => {
                warn!("breaker {} probe failed, re-opening circuit", self.name);
                inner.state = State::Open { opened_at: Instant::now() };
            }
            // late report from an attempt that was in flight when the
            // circuit opened; the count is kept, the state stands
            State::Open { .. } => {}
        }
    }

    /// A dispatched attempt ended without reaching the provider (local skip
    /// or deadline). No new evidence either way: a held probe slot is
    /// released so the next attempt can probe instead.
    pub fn abandon_probe(&self) {
        let mut inner = self.lock();
        if let State::HalfOpen { probe_in_flight: true } = inner.state {
            inner.state = State::HalfOpen { probe_in_flight: false };
        }
    }

    /// Observable state for health snapshots. Reported lazily: an expired
    /// cooldown still reads `Open` until the next admission probes.
    pub fn state(&self) -> BreakerState {
        match self.lock().state {
            State::Closed => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("breaker lock poisoned")
    }
}

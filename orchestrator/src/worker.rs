//! Provider worker: one attempt, end to end
//!
//! A worker owns a single `(job, provider)` attempt. It goes through the
//! provider's breaker admission and rate-limiter permit, drives the adapter
//! with a per-call timeout, retries transient failures within the retry
//! policy and the job deadline, and finalizes exactly one write-once
//! attempt record. Failures never cross the provider boundary: whatever
//! happens in here ends as a finalized attempt, not an error to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    ApiFailure, AttemptErrorKind, AttemptState, JobId, ProviderAttempt, RawResponse,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::core::Admission;
use crate::services::registry::ProviderHandle;
use crate::traits::ResultSink;

/// What a worker does when the rate limiter has no capacity right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePolicy {
    /// Suspend until capacity frees or the job deadline passes
    Block,
    /// Skip the attempt immediately as locally rate limited
    NonBlocking,
}

pub struct ProviderWorker {
    job_id: JobId,
    subject: Arc<str>,
    deadline: Instant,
    handle: Arc<ProviderHandle>,
    admission: Admission,
    acquire_policy: AcquirePolicy,
    sink: Arc<dyn ResultSink>,
    completions: mpsc::Sender<ProviderAttempt>,
}

impl ProviderWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        subject: Arc<str>,
        deadline: Instant,
        handle: Arc<ProviderHandle>,
        admission: Admission,
        acquire_policy: AcquirePolicy,
        sink: Arc<dyn ResultSink>,
        completions: mpsc::Sender<ProviderAttempt>,
    ) -> Self {
        Self {
            job_id,
            subject,
            deadline,
            handle,
            admission,
            acquire_policy,
            sink,
            completions,
        }
    }

    /// Run the attempt to a finalized record and report it everywhere it
    /// needs to go: the provider's breaker, the result sink, and the job's
    /// synchronization validator.
    pub async fn run(self) -> ProviderAttempt {
        let attempt = match self.admission {
            // quarantined: finalize immediately, zero external calls
            Admission::Reject => {
                ProviderAttempt::skipped(self.job_id, self.handle.config.provider, AttemptErrorKind::CircuitOpen)
            }
            Admission::Dispatch { .. } => {
                self.stagger().await;
                self.execute().await
            }
        };
        self.report(attempt).await
    }

    /// Tier-staggered launch: fast providers dial out immediately, slower
    /// tiers wait a beat so the burst hits the cheap capacity first
    async fn stagger(&self) {
        let delay = self.handle.config.tier.dispatch_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn execute(&self) -> ProviderAttempt {
        let started_at = Utc::now();

        let _permit = match self.acquire_policy {
            AcquirePolicy::NonBlocking => match self.handle.limiter.try_acquire() {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(
                        "job {}: {} has no local capacity, skipping",
                        self.job_id, self.handle.config.provider
                    );
                    return ProviderAttempt::skipped(
                        self.job_id,
                        self.handle.config.provider,
                        AttemptErrorKind::RateLimited,
                    );
                }
            },
            AcquirePolicy::Block => match self.handle.limiter.wait_acquire(self.deadline).await {
                Ok(permit) => permit,
                Err(_) => {
                    return ProviderAttempt::skipped(
                        self.job_id,
                        self.handle.config.provider,
                        AttemptErrorKind::DeadlineExceeded,
                    );
                }
            },
        };

        let policy = self.handle.config.retry;
        let started = Instant::now();
        let mut calls_made = 0u32;
        let mut retry_index = 0u32;
        let mut last_failure: Option<ApiFailure> = None;

        // permit released on every path out of this loop when `_permit`
        // drops, including cancellation of the whole worker future
        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return match last_failure {
                    None => ProviderAttempt::skipped(
                        self.job_id,
                        self.handle.config.provider,
                        AttemptErrorKind::DeadlineExceeded,
                    ),
                    Some(failure) => self.finalize_failure(started_at, started, failure, calls_made),
                };
            }

            let call_timeout = self.handle.config.call_timeout.min(remaining);
            calls_made += 1;
            let call = self.handle.adapter.send(&self.subject, call_timeout);
            let result = match tokio::time::timeout(call_timeout, call).await {
                Ok(result) => result,
                // the adapter outlived its budget; treat as a provider timeout
                Err(_) => Err(ApiFailure::Timeout),
            };

            match result {
                Ok(response) => return self.finalize_success(started_at, started, response, calls_made),
                Err(failure) => {
                    if policy.should_retry(&failure, retry_index, self.deadline) {
                        let delay = policy.delay_for(retry_index);
                        warn!(
                            "job {}: {} call {} failed ({failure:?}), retrying in {delay:?}",
                            self.job_id, self.handle.config.provider, calls_made
                        );
                        tokio::time::sleep(delay).await;
                        // every external call spends a rate token, retries included
                        if self.handle.limiter.take_token(self.deadline).await.is_err() {
                            return self.finalize_failure(started_at, started, failure, calls_made);
                        }
                        last_failure = Some(failure);
                        retry_index += 1;
                        continue;
                    }
                    return self.finalize_failure(started_at, started, failure, calls_made);
                }
            }
        }
    }

    fn finalize_success(
        &self,
        started_at: DateTime<Utc>,
        started: Instant,
        response: RawResponse,
        calls_made: u32,
    ) -> ProviderAttempt {
        ProviderAttempt {
            job_id: self.job_id,
            provider: self.handle.config.provider,
            state: AttemptState::Success,
            started_at,
            finished_at: Some(Utc::now()),
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error_kind: None,
            response: Some(response),
            calls_made,
        }
    }

    fn finalize_failure(
        &self,
        started_at: DateTime<Utc>,
        started: Instant,
        failure: ApiFailure,
        calls_made: u32,
    ) -> ProviderAttempt {
        let state = match failure {
            ApiFailure::Timeout => AttemptState::TimedOut,
            _ => AttemptState::Failed,
        };
        ProviderAttempt {
            job_id: self.job_id,
            provider: self.handle.config.provider,
            state,
            started_at,
            finished_at: Some(Utc::now()),
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error_kind: Some(failure.kind()),
            response: None,
            calls_made,
        }
    }

    /// Exactly-once outcome reporting: breaker first, then at-least-once
    /// persistence, then the validator. A validator that already decided
    /// the job has dropped its receiver; the attempt still reaches the
    /// sink for audit.
    async fn report(self, attempt: ProviderAttempt) -> ProviderAttempt {
        match attempt.state {
            AttemptState::Success => self.handle.breaker.record_success(),
            AttemptState::Failed | AttemptState::TimedOut => self.handle.breaker.record_failure(),
            AttemptState::Skipped | AttemptState::Pending => {
                // no provider evidence gathered; free a held probe slot
                if matches!(self.admission, Admission::Dispatch { probe: true }) {
                    self.handle.breaker.abandon_probe();
                }
            }
        }

        if let Err(e) = self.sink.persist_attempt(&attempt).await {
            error!(
                "job {}: failed to persist attempt for {}: {e}",
                self.job_id, self.handle.config.provider
            );
        }
        let _ = self.completions.send(attempt.clone()).await;
        attempt
    }
}

//! Job intake and fan-out
//!
//! The dispatcher owns the job table. `submit` validates a subject and its
//! synchronization window, `dispatch` fans the job out to every provider
//! the breaker admits (one worker each, never awaited), and
//! `await_completion` hands the job to the synchronization validator and
//! records its terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shared::{Job, JobId, JobOutcome, JobStatus, ProviderAttempt};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{error, info};

use crate::core::validator;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::registry::ProviderRegistry;
use crate::traits::ResultSink;
use crate::worker::{AcquirePolicy, ProviderWorker};

/// Process-wide dispatch settings
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Default synchronization window for jobs submitted without an
    /// explicit deadline
    pub sync_window: Duration,
    pub acquire_policy: AcquirePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sync_window: Duration::from_secs(300),
            acquire_policy: AcquirePolicy::Block,
        }
    }
}

struct JobEntry {
    job: Job,
    deadline: Instant,
    /// Attempt stream for the validator; consumed by `await_completion`
    completions: Option<mpsc::Receiver<ProviderAttempt>>,
}

pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn ResultSink>,
    config: DispatchConfig,
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, sink: Arc<dyn ResultSink>, config: DispatchConfig) -> Self {
        Self {
            registry,
            sink,
            config,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Accept one unit of work. A deadline override must leave room for the
    /// slowest provider to exhaust its retry budget at least once.
    pub async fn submit(&self, subject: &str, deadline_override: Option<Duration>) -> OrchestratorResult<JobId> {
        if subject.trim().is_empty() {
            return Err(OrchestratorError::InvalidSubject);
        }
        if self.registry.is_empty() {
            return Err(OrchestratorError::NoProvidersConfigured);
        }
        if let Some(requested) = deadline_override {
            let minimum = self.registry.min_viable_deadline();
            if requested < minimum {
                return Err(OrchestratorError::InvalidDeadline { requested, minimum });
            }
        }

        let window = deadline_override.unwrap_or(self.config.sync_window);
        let job = Job::new(subject.to_string(), window);
        let job_id = job.id;
        let deadline = Instant::now() + window;

        self.jobs.write().await.insert(
            job_id,
            JobEntry {
                job,
                deadline,
                completions: None,
            },
        );
        info!("📥 job {job_id} accepted: \"{subject}\" (window {window:?})");
        Ok(job_id)
    }

    /// Fan the job out to every provider. Idempotent: a job that already
    /// left `Pending` is left alone.
    pub async fn dispatch(&self, job_id: JobId) -> OrchestratorResult<()> {
        let (subject, deadline, completions_tx) = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs
                .get_mut(&job_id)
                .ok_or(OrchestratorError::JobNotFound { job_id })?;
            if entry.job.status != JobStatus::Pending {
                return Ok(());
            }

            let expected = self.registry.len();
            let (tx, rx) = mpsc::channel(expected);
            entry.job.status = JobStatus::Dispatched;
            entry.job.attempt_count = expected;
            entry.completions = Some(rx);

            let subject: Arc<str> = Arc::from(entry.job.subject.as_str());
            (subject, entry.deadline, tx)
        };

        // snapshot of the registry's admission decisions; providers whose
        // breaker rejects still get a worker so the validator's accounting
        // sees one attempt per expected provider
        for handle in self.registry.providers() {
            let admission = handle.breaker.admit();
            let worker = ProviderWorker::new(
                job_id,
                subject.clone(),
                deadline,
                handle.clone(),
                admission,
                self.config.acquire_policy,
                self.sink.clone(),
                completions_tx.clone(),
            );
            tokio::spawn(worker.run());
        }

        info!("🚀 job {job_id} dispatched to {} providers", self.registry.len());
        Ok(())
    }

    /// Wait out the synchronization window and decide the job. Consumes the
    /// job's attempt stream; calling twice returns `OutcomeUnavailable`.
    pub async fn await_completion(&self, job_id: JobId) -> OrchestratorResult<JobOutcome> {
        let (expected, deadline, completions) = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs
                .get_mut(&job_id)
                .ok_or(OrchestratorError::JobNotFound { job_id })?;
            let completions = entry
                .completions
                .take()
                .ok_or(OrchestratorError::OutcomeUnavailable { job_id })?;
            (entry.job.attempt_count, entry.deadline, completions)
        };

        let outcome = validator::await_completion(job_id, expected, deadline, completions).await;

        if let Err(e) = self.sink.persist_outcome(&outcome).await {
            error!("job {job_id}: failed to persist outcome: {e}");
        }
        {
            let mut jobs = self.jobs.write().await;
            if let Some(entry) = jobs.get_mut(&job_id) {
                entry.job.status = outcome.status;
            }
        }
        info!(
            "📊 job {job_id} decided: {:?} (coverage {}/{})",
            outcome.status, outcome.success_count, outcome.expected_count
        );
        Ok(outcome)
    }

    /// Submit, dispatch, and wait for the decision in one call
    pub async fn run_job(&self, subject: &str, deadline_override: Option<Duration>) -> OrchestratorResult<JobOutcome> {
        let job_id = self.submit(subject, deadline_override).await?;
        self.dispatch(job_id).await?;
        self.await_completion(job_id).await
    }

    /// Current view of a job's record
    pub async fn job(&self, job_id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&job_id).map(|entry| entry.job.clone())
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }
}

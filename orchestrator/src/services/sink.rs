//! In-memory result sink
//!
//! Reference implementation of the sink contract: idempotent writes keyed
//! by `(job_id, provider)` for attempts and `job_id` for outcomes. Workers
//! deliver at-least-once, so the first write wins and every replay is a
//! no-op. Durable backends implement the same trait.

use std::collections::HashMap;
use std::sync::Arc;

use shared::{JobId, JobOutcome, ProviderAttempt, ProviderId};
use tokio::sync::RwLock;

use crate::error::OrchestratorResult;
use crate::traits::ResultSink;

#[derive(Clone, Default)]
pub struct MemoryResultSink {
    attempts: Arc<RwLock<HashMap<(JobId, ProviderId), ProviderAttempt>>>,
    outcomes: Arc<RwLock<HashMap<JobId, JobOutcome>>>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attempt(&self, job_id: JobId, provider: ProviderId) -> Option<ProviderAttempt> {
        self.attempts.read().await.get(&(job_id, provider)).cloned()
    }

    pub async fn attempts_for_job(&self, job_id: JobId) -> Vec<ProviderAttempt> {
        self.attempts
            .read()
            .await
            .values()
            .filter(|attempt| attempt.job_id == job_id)
            .cloned()
            .collect()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    pub async fn outcome(&self, job_id: JobId) -> Option<JobOutcome> {
        self.outcomes.read().await.get(&job_id).cloned()
    }
}

#[async_trait::async_trait]
impl ResultSink for MemoryResultSink {
    async fn persist_attempt(&self, attempt: &ProviderAttempt) -> OrchestratorResult<()> {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry((attempt.job_id, attempt.provider))
            .or_insert_with(|| attempt.clone());
        Ok(())
    }

    async fn persist_outcome(&self, outcome: &JobOutcome) -> OrchestratorResult<()> {
        let mut outcomes = self.outcomes.write().await;
        outcomes.entry(outcome.job_id).or_insert_with(|| outcome.clone());
        Ok(())
    }
}

//! Trait definitions with mockall annotations for testing
//!
//! These are the capability seams of the dispatch core. Everything the
//! orchestrator talks to across a process or network boundary sits behind
//! one of these traits so tests can substitute scripted implementations.

use std::time::Duration;

use shared::{ApiFailure, JobOutcome, ProviderAttempt, ProviderHealthSnapshot, RawResponse};

use crate::error::OrchestratorResult;

/// One provider's request/response capability.
///
/// Implemented once per provider family. Adapters must not retry on their
/// own: retry policy belongs to the worker driving them. Rotation across
/// multiple credentials for the same provider happens inside the adapter
/// and is invisible to the orchestrator.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Send one request about `subject`, bounded by `timeout`
    async fn send(&self, subject: &str, timeout: Duration) -> Result<RawResponse, ApiFailure>;
}

/// Durable storage for finalized attempts and job outcomes.
///
/// Both writes are idempotent: attempts dedup on `(job_id, provider)`,
/// outcomes on `job_id`. Workers deliver at-least-once.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist_attempt(&self, attempt: &ProviderAttempt) -> OrchestratorResult<()>;

    async fn persist_outcome(&self, outcome: &JobOutcome) -> OrchestratorResult<()>;
}

/// Consumer of periodic per-provider health snapshots
#[mockall::automock]
#[async_trait::async_trait]
pub trait HealthSink: Send + Sync {
    async fn record(&self, snapshot: ProviderHealthSnapshot) -> OrchestratorResult<()>;
}

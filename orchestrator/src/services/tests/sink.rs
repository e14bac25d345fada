//! Sink idempotency tests

use chrono::Utc;
use shared::{AttemptErrorKind, AttemptState, JobId, JobOutcome, JobStatus, ProviderAttempt, ProviderId};

use crate::services::sink::MemoryResultSink;
use crate::traits::ResultSink;

fn attempt(job_id: JobId, provider: ProviderId, state: AttemptState) -> ProviderAttempt {
    let now = Utc::now();
    ProviderAttempt {
        job_id,
        provider,
        state,
        started_at: now,
        finished_at: Some(now),
        latency_ms: Some(100),
        error_kind: None,
        response: None,
        calls_made: 1,
    }
}

#[tokio::test]
async fn test_duplicate_attempt_stores_one_record() {
    let sink = MemoryResultSink::new();
    let job_id = JobId::new();

    let first = attempt(job_id, ProviderId::OpenAI, AttemptState::Success);
    sink.persist_attempt(&first).await.unwrap();

    // at-least-once redelivery with a conflicting state: first write wins
    let replay = attempt(job_id, ProviderId::OpenAI, AttemptState::Failed);
    sink.persist_attempt(&replay).await.unwrap();

    assert_eq!(sink.attempt_count().await, 1);
    let stored = sink.attempt(job_id, ProviderId::OpenAI).await.unwrap();
    assert_eq!(stored.state, AttemptState::Success);
}

#[tokio::test]
async fn test_attempts_keyed_by_job_and_provider() {
    let sink = MemoryResultSink::new();
    let job_a = JobId::new();
    let job_b = JobId::new();

    sink.persist_attempt(&attempt(job_a, ProviderId::OpenAI, AttemptState::Success))
        .await
        .unwrap();
    sink.persist_attempt(&attempt(job_a, ProviderId::Google, AttemptState::Failed))
        .await
        .unwrap();
    sink.persist_attempt(&attempt(job_b, ProviderId::OpenAI, AttemptState::Success))
        .await
        .unwrap();

    assert_eq!(sink.attempt_count().await, 3);
    assert_eq!(sink.attempts_for_job(job_a).await.len(), 2);
    assert_eq!(sink.attempts_for_job(job_b).await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_outcome_stores_one_record() {
    let sink = MemoryResultSink::new();
    let job_id = JobId::new();

    let outcome = JobOutcome {
        job_id,
        status: JobStatus::Degraded,
        coverage: 0.5,
        success_count: 1,
        expected_count: 2,
        decided_at: Utc::now(),
        attempts: vec![attempt(job_id, ProviderId::OpenAI, AttemptState::Success)],
    };
    sink.persist_outcome(&outcome).await.unwrap();

    let mut replay = outcome.clone();
    replay.status = JobStatus::Complete;
    sink.persist_outcome(&replay).await.unwrap();

    let stored = sink.outcome(job_id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Degraded);
}

#[tokio::test]
async fn test_late_attempt_persists_after_outcome() {
    // attempts that finalize after the job is decided are audit data:
    // the sink stores them like any other
    let sink = MemoryResultSink::new();
    let job_id = JobId::new();

    let outcome = JobOutcome {
        job_id,
        status: JobStatus::Degraded,
        coverage: 0.5,
        success_count: 1,
        expected_count: 2,
        decided_at: Utc::now(),
        attempts: Vec::new(),
    };
    sink.persist_outcome(&outcome).await.unwrap();

    let mut late = attempt(job_id, ProviderId::Google, AttemptState::Skipped);
    late.error_kind = Some(AttemptErrorKind::DeadlineExceeded);
    sink.persist_attempt(&late).await.unwrap();

    assert!(sink.attempt(job_id, ProviderId::Google).await.is_some());
    // and the decided outcome is untouched
    assert_eq!(sink.outcome(job_id).await.unwrap().status, JobStatus::Degraded);
}

//! Synchronization window accounting
//!
//! Collects finalized attempts for one job and decides its terminal state:
//! wait until every expected provider has answered or the deadline passes,
//! whichever comes first. The decision is a set computation over whatever
//! arrived in time: attempts may finalize in any order, and anything that
//! lands after the decision is audit data only.

use std::collections::HashSet;

use chrono::Utc;
use shared::{JobId, JobOutcome, JobStatus, ProviderAttempt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Wait for the job's attempts and decide its outcome exactly once.
///
/// `expected_count` is the fan-out size fixed at dispatch time. The
/// receiver carries at most one finalized attempt per provider; duplicates
/// are dropped here as a second line of defense behind the write-once
/// attempt invariant.
pub async fn await_completion(
    job_id: JobId,
    expected_count: usize,
    deadline: Instant,
    mut rx: mpsc::Receiver<ProviderAttempt>,
) -> JobOutcome {
    let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(expected_count);
    let mut reported = HashSet::new();

    while attempts.len() < expected_count {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some(attempt) => {
                        if !reported.insert(attempt.provider) {
                            warn!("job {job_id}: duplicate attempt from {} dropped", attempt.provider);
                            continue;
                        }
                        debug!(
                            "job {job_id}: {} finalized as {:?} ({}/{expected_count})",
                            attempt.provider,
                            attempt.state,
                            attempts.len() + 1
                        );
                        attempts.push(attempt);
                    }
                    // every worker sends exactly once; a closed channel
                    // means nothing further can arrive
                    None => break,
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                debug!(
                    "job {job_id}: window closed with {}/{} attempts finalized",
                    attempts.len(),
                    expected_count
                );
                break;
            }
        }
    }

    decide(job_id, expected_count, attempts)
}

/// Pure decision rule: full coverage is Complete, partial is Degraded,
/// zero is Failed. The acceptance threshold for a partial result belongs
/// to the consumer, not to this component.
fn decide(job_id: JobId, expected_count: usize, attempts: Vec<ProviderAttempt>) -> JobOutcome {
    let success_count = attempts.iter().filter(|a| a.is_success()).count();
    let coverage = if expected_count == 0 {
        0.0
    } else {
        success_count as f64 / expected_count as f64
    };
    let status = if success_count == expected_count && expected_count > 0 {
        JobStatus::Complete
    } else if success_count > 0 {
        JobStatus::Degraded
    } else {
        JobStatus::Failed
    };

    JobOutcome {
        job_id,
        status,
        coverage,
        success_count,
        expected_count,
        decided_at: Utc::now(),
        attempts,
    }
}

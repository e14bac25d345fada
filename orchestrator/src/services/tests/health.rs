//! Health reporter sampling tests

use std::sync::Arc;
use std::time::Duration;

use shared::{BreakerState, ProviderHealthSnapshot, ProviderId};
use tokio::sync::Mutex;

use crate::error::OrchestratorResult;
use crate::services::health::HealthReporter;
use crate::services::registry::{ProviderConfig, ProviderRegistry};
use crate::traits::{HealthSink, MockProviderAdapter};

/// Sink that stores every snapshot it is handed
#[derive(Clone, Default)]
struct RecordingHealthSink {
    snapshots: Arc<Mutex<Vec<ProviderHealthSnapshot>>>,
}

#[async_trait::async_trait]
impl HealthSink for RecordingHealthSink {
    async fn record(&self, snapshot: ProviderHealthSnapshot) -> OrchestratorResult<()> {
        self.snapshots.lock().await.push(snapshot);
        Ok(())
    }
}

fn registry(providers: &[ProviderId]) -> Arc<ProviderRegistry> {
    let entries = providers
        .iter()
        .map(|p| {
            (
                ProviderConfig::production_defaults(*p),
                Arc::new(MockProviderAdapter::new()) as Arc<dyn crate::traits::ProviderAdapter>,
            )
        })
        .collect();
    Arc::new(ProviderRegistry::new(entries).unwrap())
}

#[tokio::test]
async fn test_reporter_samples_every_provider_each_period() {
    let registry = registry(&[ProviderId::OpenAI, ProviderId::Google]);
    let sink = RecordingHealthSink::default();

    let reporter = HealthReporter::new(registry, Arc::new(sink.clone()), Duration::from_millis(25));
    let handle = reporter.spawn();

    tokio::time::sleep(Duration::from_millis(90)).await;
    handle.abort();

    let snapshots = sink.snapshots.lock().await;
    // at least two full sampling rounds of two providers each
    assert!(snapshots.len() >= 4, "only {} snapshots taken", snapshots.len());
    assert!(snapshots.iter().any(|s| s.provider == ProviderId::OpenAI));
    assert!(snapshots.iter().any(|s| s.provider == ProviderId::Google));
    assert!(snapshots.iter().all(|s| s.breaker_state == BreakerState::Closed));
}

#[tokio::test]
async fn test_snapshots_reflect_breaker_trips() {
    let registry = registry(&[ProviderId::OpenAI]);
    let handle = &registry.providers()[0];
    for _ in 0..handle.config.failure_threshold {
        handle.breaker.record_failure();
    }

    let sink = RecordingHealthSink::default();
    let reporter = HealthReporter::new(registry.clone(), Arc::new(sink.clone()), Duration::from_millis(20));
    let task = reporter.spawn();
    tokio::time::sleep(Duration::from_millis(50)).await;
    task.abort();

    let snapshots = sink.snapshots.lock().await;
    assert!(!snapshots.is_empty());
    assert!(snapshots.iter().all(|s| s.breaker_state == BreakerState::Open));
    assert!(snapshots.iter().all(|s| s.consecutive_failures == 5));
}

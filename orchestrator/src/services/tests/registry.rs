//! Registry construction and validation tests

use std::sync::Arc;
use std::time::Duration;

use shared::{BreakerState, ProviderId, ProviderTier};

use crate::error::OrchestratorError;
use crate::services::registry::{ProviderConfig, ProviderRegistry};
use crate::traits::MockProviderAdapter;

fn entry(provider: ProviderId) -> (ProviderConfig, Arc<dyn crate::traits::ProviderAdapter>) {
    (
        ProviderConfig::production_defaults(provider),
        Arc::new(MockProviderAdapter::new()),
    )
}

#[test]
fn test_production_defaults_cover_all_providers() {
    for provider in ProviderId::ALL {
        let config = ProviderConfig::production_defaults(provider);
        assert_eq!(config.provider, provider);
        assert!(config.requests_per_minute > 0);
        assert!(config.max_concurrent > 0);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_secs(60));
    }
    // the extremes of the table
    let openai = ProviderConfig::production_defaults(ProviderId::OpenAI);
    let google = ProviderConfig::production_defaults(ProviderId::Google);
    assert_eq!(openai.requests_per_minute, 500);
    assert_eq!(openai.tier, ProviderTier::Fast);
    assert_eq!(google.requests_per_minute, 60);
    assert_eq!(google.tier, ProviderTier::Slow);
}

#[test]
fn test_rejects_zero_rate_limit() {
    let mut config = ProviderConfig::production_defaults(ProviderId::OpenAI);
    config.requests_per_minute = 0;
    let result = ProviderRegistry::new(vec![(config, Arc::new(MockProviderAdapter::new()))]);
    assert!(matches!(result, Err(OrchestratorError::SharedError(_))));
}

#[test]
fn test_rejects_zero_concurrency() {
    let mut config = ProviderConfig::production_defaults(ProviderId::OpenAI);
    config.max_concurrent = 0;
    let result = ProviderRegistry::new(vec![(config, Arc::new(MockProviderAdapter::new()))]);
    assert!(matches!(result, Err(OrchestratorError::SharedError(_))));
}

#[test]
fn test_rejects_empty_registry() {
    let result = ProviderRegistry::new(Vec::new());
    assert!(matches!(result, Err(OrchestratorError::NoProvidersConfigured)));
}

#[test]
fn test_min_viable_deadline_tracks_slowest_provider() {
    // fast only: 2.5s expected latency x 3 calls
    let fast = ProviderRegistry::new(vec![entry(ProviderId::OpenAI)]).unwrap();
    assert_eq!(fast.min_viable_deadline(), Duration::from_millis(7500));

    // adding a slow provider raises the floor to 7s x 3
    let mixed = ProviderRegistry::new(vec![entry(ProviderId::OpenAI), entry(ProviderId::Google)]).unwrap();
    assert_eq!(mixed.min_viable_deadline(), Duration::from_millis(21000));
}

#[test]
fn test_fresh_registry_reports_healthy() {
    let registry = ProviderRegistry::new(vec![entry(ProviderId::OpenAI), entry(ProviderId::Anthropic)]).unwrap();
    let snapshots = registry.health_snapshots();
    assert_eq!(snapshots.len(), 2);
    for snapshot in snapshots {
        assert_eq!(snapshot.breaker_state, BreakerState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.in_flight, 0);
        assert!(snapshot.tokens_available > 0.0);
    }
}

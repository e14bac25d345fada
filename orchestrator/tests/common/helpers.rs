//! Builders for registries and dispatchers tuned for fast tests

use std::sync::Arc;
use std::time::Duration;

use shared::{ProviderId, ProviderTier};

use orchestrator::{
    AcquirePolicy, DispatchConfig, Dispatcher, MemoryResultSink, ProviderAdapter, ProviderConfig,
    ProviderRegistry, RetryPolicy,
};

use super::fixtures::ScriptedAdapter;

/// Fast-tier config with generous limits and a test-friendly backoff
pub fn test_config(provider: ProviderId) -> ProviderConfig {
    ProviderConfig {
        provider,
        requests_per_minute: 600,
        max_concurrent: 8,
        tier: ProviderTier::Fast,
        call_timeout: Duration::from_secs(5),
        failure_threshold: 5,
        cooldown: Duration::from_secs(60),
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(20),
            multiplier: 2.0,
        },
    }
}

pub fn registry_of(entries: Vec<(ProviderConfig, Arc<ScriptedAdapter>)>) -> Arc<ProviderRegistry> {
    let entries = entries
        .into_iter()
        .map(|(config, adapter)| (config, adapter as Arc<dyn ProviderAdapter>))
        .collect();
    Arc::new(ProviderRegistry::new(entries).unwrap())
}

pub fn dispatcher(
    registry: Arc<ProviderRegistry>,
    sink: Arc<MemoryResultSink>,
    window: Duration,
) -> Arc<Dispatcher> {
    dispatcher_with_policy(registry, sink, window, AcquirePolicy::Block)
}

pub fn dispatcher_with_policy(
    registry: Arc<ProviderRegistry>,
    sink: Arc<MemoryResultSink>,
    window: Duration,
    acquire_policy: AcquirePolicy,
) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        registry,
        sink,
        DispatchConfig {
            sync_window: window,
            acquire_policy,
        },
    ))
}

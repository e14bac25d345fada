//! Periodic provider health reporting
//!
//! Samples every provider handle on a fixed interval and pushes the
//! snapshots to a `HealthSink`. The default sink just logs; a metrics
//! backend implements the same trait.

use std::sync::Arc;
use std::time::Duration;

use shared::ProviderHealthSnapshot;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::error::OrchestratorResult;
use crate::services::registry::ProviderRegistry;
use crate::traits::HealthSink;

pub struct HealthReporter {
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn HealthSink>,
    period: Duration,
}

impl HealthReporter {
    pub fn new(registry: Arc<ProviderRegistry>, sink: Arc<dyn HealthSink>, period: Duration) -> Self {
        Self { registry, sink, period }
    }

    /// Start the sampling loop. Runs until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            // the first tick fires immediately; skip it so samples are
            // spaced one full period apart from startup
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for snapshot in self.registry.health_snapshots() {
                    if let Err(e) = self.sink.record(snapshot).await {
                        warn!("health snapshot dropped: {e}");
                    }
                }
            }
        })
    }
}

/// Health sink that reports through the tracing pipeline
pub struct TracingHealthSink;

#[async_trait::async_trait]
impl HealthSink for TracingHealthSink {
    async fn record(&self, snapshot: ProviderHealthSnapshot) -> OrchestratorResult<()> {
        info!(
            "💓 {} breaker={} failures={} in_flight={} tokens={:.1}",
            snapshot.provider,
            snapshot.breaker_state,
            snapshot.consecutive_failures,
            snapshot.in_flight,
            snapshot.tokens_available
        );
        Ok(())
    }
}

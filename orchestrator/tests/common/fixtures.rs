//! Scripted provider adapters for integration tests
//!
//! A `ScriptedAdapter` plays back a fixed per-call script (clamping to the
//! last entry when calls outrun it) while counting every call it receives,
//! so tests can assert on exactly how often and how concurrently the
//! orchestrator dialed out.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shared::{ApiFailure, ProviderId, RawResponse};

use orchestrator::ProviderAdapter;

/// One scripted adapter call
#[derive(Debug, Clone)]
pub enum ScriptedCall {
    Succeed { latency: Duration },
    Fail { failure: ApiFailure, latency: Duration },
}

pub struct ScriptedAdapter {
    provider: ProviderId,
    script: Vec<ScriptedCall>,
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

/// Decrements the in-flight gauge even when the call future is cancelled
struct InFlightGuard<'a>(&'a AtomicU32);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedAdapter {
    pub fn script(provider: ProviderId, script: Vec<ScriptedCall>) -> Arc<Self> {
        assert!(!script.is_empty(), "scripted adapter needs at least one call");
        Arc::new(Self {
            provider,
            script,
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        })
    }

    pub fn always_succeed(provider: ProviderId, latency: Duration) -> Arc<Self> {
        Self::script(provider, vec![ScriptedCall::Succeed { latency }])
    }

    pub fn always_fail(provider: ProviderId, failure: ApiFailure, latency: Duration) -> Arc<Self> {
        Self::script(provider, vec![ScriptedCall::Fail { failure, latency }])
    }

    /// Never answers within any realistic window
    pub fn hang(provider: ProviderId) -> Arc<Self> {
        Self::always_succeed(provider, Duration::from_secs(3600))
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// External calls the adapter actually received
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously in-flight calls observed
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn response(&self) -> RawResponse {
        RawResponse {
            provider: self.provider,
            model: "scripted".to_string(),
            content: format!("response from {}", self.provider),
            latency_ms: 0,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn send(&self, _subject: &str, _timeout: Duration) -> Result<RawResponse, ApiFailure> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let step = self.script.get(call_index).unwrap_or_else(|| {
            self.script.last().expect("script is non-empty")
        });
        match step.clone() {
            ScriptedCall::Succeed { latency } => {
                tokio::time::sleep(latency).await;
                Ok(self.response())
            }
            ScriptedCall::Fail { failure, latency } => {
                tokio::time::sleep(latency).await;
                Err(failure)
            }
        }
    }
}

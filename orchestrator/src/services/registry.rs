//! Provider registry: process-wide, read-mostly provider state
//!
//! Populated once at startup from configuration and never mutated at
//! request time. Each provider gets exactly one rate limiter and one
//! circuit breaker, shared by every job concurrently in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared::{ProviderHealthSnapshot, ProviderId, ProviderTier, SharedError};

use crate::core::{CircuitBreaker, RateLimiter, RetryPolicy};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ProviderAdapter;

/// Static description of one provider, immutable for the process lifetime
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderId,
    pub requests_per_minute: u32,
    pub max_concurrent: usize,
    pub tier: ProviderTier,
    /// Per-call timeout; the worker clamps it to the job's remaining window
    pub call_timeout: Duration,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    /// Retry budget and backoff curve consulted by the worker
    pub retry: RetryPolicy,
}

impl ProviderConfig {
    /// Production limits per provider. Rate budgets follow what each
    /// service actually grants; concurrency stays small because several
    /// providers allow high burst RPM over only a few connections.
    pub fn production_defaults(provider: ProviderId) -> Self {
        let (requests_per_minute, max_concurrent, tier) = match provider {
            ProviderId::OpenAI => (500, 8, ProviderTier::Fast),
            ProviderId::Anthropic => (300, 6, ProviderTier::Fast),
            ProviderId::Groq => (240, 4, ProviderTier::Fast),
            ProviderId::Mistral => (250, 4, ProviderTier::Medium),
            ProviderId::DeepSeek => (200, 4, ProviderTier::Medium),
            ProviderId::Cohere => (180, 4, ProviderTier::Medium),
            ProviderId::AI21 => (120, 3, ProviderTier::Medium),
            ProviderId::Perplexity => (150, 3, ProviderTier::Slow),
            ProviderId::Together => (120, 3, ProviderTier::Slow),
            ProviderId::XAI => (100, 3, ProviderTier::Slow),
            ProviderId::Google => (60, 2, ProviderTier::Slow),
        };
        Self {
            provider,
            requests_per_minute,
            max_concurrent,
            tier,
            call_timeout: Duration::from_secs(30),
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            retry: RetryPolicy::for_tier(tier),
        }
    }

    fn validate(&self) -> OrchestratorResult<()> {
        if self.requests_per_minute == 0 {
            return Err(SharedError::InvalidConfig {
                field: format!("{}.requests_per_minute", self.provider),
                value: "0".to_string(),
            }
            .into());
        }
        if self.max_concurrent == 0 {
            return Err(SharedError::InvalidConfig {
                field: format!("{}.max_concurrent", self.provider),
                value: "0".to_string(),
            }
            .into());
        }
        if self.failure_threshold == 0 {
            return Err(SharedError::InvalidConfig {
                field: format!("{}.failure_threshold", self.provider),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// One provider's dispatch surface: config plus the limiter, breaker and
/// adapter every worker for this provider goes through
pub struct ProviderHandle {
    pub config: ProviderConfig,
    pub limiter: RateLimiter,
    pub breaker: CircuitBreaker,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl ProviderHandle {
    pub fn new(config: ProviderConfig, adapter: Arc<dyn ProviderAdapter>) -> OrchestratorResult<Self> {
        config.validate()?;
        let limiter = RateLimiter::new(config.requests_per_minute, config.max_concurrent);
        let breaker = CircuitBreaker::new(config.provider.as_str(), config.failure_threshold, config.cooldown);
        Ok(Self {
            config,
            limiter,
            breaker,
            adapter,
        })
    }

    pub fn health_snapshot(&self) -> ProviderHealthSnapshot {
        ProviderHealthSnapshot {
            provider: self.config.provider,
            breaker_state: self.breaker.state(),
            consecutive_failures: self.breaker.consecutive_failures(),
            in_flight: self.limiter.in_flight(),
            tokens_available: self.limiter.tokens_available(),
            taken_at: Utc::now(),
        }
    }
}

/// The full provider set for this process
pub struct ProviderRegistry {
    providers: Vec<Arc<ProviderHandle>>,
}

impl ProviderRegistry {
    pub fn new(entries: Vec<(ProviderConfig, Arc<dyn ProviderAdapter>)>) -> OrchestratorResult<Self> {
        if entries.is_empty() {
            return Err(OrchestratorError::NoProvidersConfigured);
        }
        let mut providers = Vec::with_capacity(entries.len());
        for (config, adapter) in entries {
            providers.push(Arc::new(ProviderHandle::new(config, adapter)?));
        }
        Ok(Self { providers })
    }

    pub fn providers(&self) -> &[Arc<ProviderHandle>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Smallest deadline a job may request: the slowest provider's expected
    /// latency times its full call budget. Anything shorter could never see
    /// that provider answer even once.
    pub fn min_viable_deadline(&self) -> Duration {
        self.providers
            .iter()
            .map(|handle| handle.config.tier.expected_latency() * handle.config.retry.call_budget())
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn health_snapshots(&self) -> Vec<ProviderHealthSnapshot> {
        self.providers.iter().map(|handle| handle.health_snapshot()).collect()
    }
}

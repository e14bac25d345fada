//! Core shared types and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for dispatch jobs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for downstream LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    OpenAI,
    Anthropic,
    DeepSeek,
    Mistral,
    Cohere,
    AI21,
    Google,
    Groq,
    Together,
    Perplexity,
    XAI,
}

impl ProviderId {
    /// All providers the system knows about, in registry order
    pub const ALL: [ProviderId; 11] = [
        ProviderId::OpenAI,
        ProviderId::Anthropic,
        ProviderId::DeepSeek,
        ProviderId::Mistral,
        ProviderId::Cohere,
        ProviderId::AI21,
        ProviderId::Google,
        ProviderId::Groq,
        ProviderId::Together,
        ProviderId::Perplexity,
        ProviderId::XAI,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(ProviderId::OpenAI),
            "anthropic" => Some(ProviderId::Anthropic),
            "deepseek" => Some(ProviderId::DeepSeek),
            "mistral" => Some(ProviderId::Mistral),
            "cohere" => Some(ProviderId::Cohere),
            "ai21" => Some(ProviderId::AI21),
            "google" => Some(ProviderId::Google),
            "groq" => Some(ProviderId::Groq),
            "together" => Some(ProviderId::Together),
            "perplexity" => Some(ProviderId::Perplexity),
            "xai" | "grok" => Some(ProviderId::XAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Mistral => "mistral",
            ProviderId::Cohere => "cohere",
            ProviderId::AI21 => "ai21",
            ProviderId::Google => "google",
            ProviderId::Groq => "groq",
            ProviderId::Together => "together",
            ProviderId::Perplexity => "perplexity",
            ProviderId::XAI => "xai",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider speed tier, used for deadline validation and dispatch staggering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderTier {
    Fast,
    Medium,
    Slow,
}

impl ProviderTier {
    /// Typical end-to-end latency for one call in this tier
    pub fn expected_latency(&self) -> Duration {
        match self {
            ProviderTier::Fast => Duration::from_millis(2500),
            ProviderTier::Medium => Duration::from_millis(3500),
            ProviderTier::Slow => Duration::from_millis(7000),
        }
    }

    /// Launch offset applied when fanning a job out across tiers
    pub fn dispatch_delay(&self) -> Duration {
        match self {
            ProviderTier::Fast => Duration::ZERO,
            ProviderTier::Medium => Duration::from_millis(200),
            ProviderTier::Slow => Duration::from_millis(500),
        }
    }
}

/// Lifecycle states for a dispatch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Dispatched,
    Complete,
    Degraded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Degraded | JobStatus::Failed)
    }
}

/// One unit of work: a subject queried across all eligible providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub subject: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Length of the synchronization window measured from `created_at`
    pub window: Duration,
    /// Number of providers the job was fanned out to
    pub attempt_count: usize,
}

impl Job {
    pub fn new(subject: String, window: Duration) -> Self {
        Self {
            id: JobId::new(),
            subject,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            window,
            attempt_count: 0,
        }
    }

    /// Wall-clock end of the synchronization window
    pub fn deadline(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Terminal states for one provider's handling of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptState {
    Pending,
    Success,
    Failed,
    TimedOut,
    Skipped,
}

/// Why an attempt failed or was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptErrorKind {
    /// Local throughput cap reached, no external call was made
    RateLimited,
    /// Provider is quarantined, no external call was made
    CircuitOpen,
    /// Provider rejected our credentials; never retried
    AuthError,
    /// The external call did not answer in time
    Timeout,
    /// Connection-level or server-side failure, retryable
    TransientNetwork,
    /// The provider itself returned a 429
    RateLimitedByProvider,
    /// The provider answered but violated its response contract
    MalformedResponse,
    /// The job's deadline arrived before the attempt could finish
    DeadlineExceeded,
}

/// API failure reasons reported by provider adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiFailure {
    /// Authentication failed (invalid API key)
    AuthenticationFailed,
    /// Provider-side rate limit exceeded
    RateLimitExceeded,
    /// Network/connection error
    NetworkError(String),
    /// Server error from provider
    ServerError(String),
    /// Service temporarily unavailable
    ServiceUnavailable,
    /// Request timeout
    Timeout,
    /// The response did not match the provider's contract
    MalformedResponse(String),
}

impl ApiFailure {
    /// Map an adapter failure onto the attempt error taxonomy
    pub fn kind(&self) -> AttemptErrorKind {
        match self {
            ApiFailure::AuthenticationFailed => AttemptErrorKind::AuthError,
            ApiFailure::RateLimitExceeded => AttemptErrorKind::RateLimitedByProvider,
            ApiFailure::NetworkError(_) | ApiFailure::ServerError(_) | ApiFailure::ServiceUnavailable => {
                AttemptErrorKind::TransientNetwork
            }
            ApiFailure::Timeout => AttemptErrorKind::Timeout,
            ApiFailure::MalformedResponse(_) => AttemptErrorKind::MalformedResponse,
        }
    }

    /// Whether a failure of this kind may be retried at all. Auth failures
    /// and contract violations are final: retrying cannot change the
    /// credentials or the provider's reply shape.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiFailure::RateLimitExceeded
                | ApiFailure::NetworkError(_)
                | ApiFailure::ServerError(_)
                | ApiFailure::ServiceUnavailable
                | ApiFailure::Timeout
        )
    }
}

/// Raw payload returned by one provider adapter call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResponse {
    pub provider: ProviderId,
    pub model: String,
    pub content: String,
    pub latency_ms: u64,
}

/// One provider's outcome for one job. Write-once: built and finalized by
/// exactly one worker, never mutated after its state leaves `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub job_id: JobId,
    pub provider: ProviderId,
    pub state: AttemptState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub latency_ms: Option<u64>,
    pub error_kind: Option<AttemptErrorKind>,
    pub response: Option<RawResponse>,
    /// External calls actually issued (0 for skips, >1 when retries ran)
    pub calls_made: u32,
}

impl ProviderAttempt {
    /// An attempt finalized without any external call
    pub fn skipped(job_id: JobId, provider: ProviderId, kind: AttemptErrorKind) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            provider,
            state: AttemptState::Skipped,
            started_at: now,
            finished_at: Some(now),
            latency_ms: Some(0),
            error_kind: Some(kind),
            response: None,
            calls_made: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == AttemptState::Success
    }
}

/// Final decision for a job once its synchronization window closes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    /// `success_count / expected_count`
    pub coverage: f64,
    pub success_count: usize,
    pub expected_count: usize,
    pub decided_at: DateTime<Utc>,
    /// Attempts finalized before the decision, in arrival order
    pub attempts: Vec<ProviderAttempt>,
}

/// Observable breaker state, shared vocabulary for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Point-in-time view of one provider's dispatch health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthSnapshot {
    pub provider: ProviderId,
    pub breaker_state: BreakerState,
    pub consecutive_failures: u32,
    pub in_flight: usize,
    pub tokens_available: f64,
    pub taken_at: DateTime<Utc>,
}

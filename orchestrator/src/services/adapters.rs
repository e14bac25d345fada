//! HTTP provider adapters
//!
//! One adapter per provider, all polymorphic over the single `send`
//! capability so the dispatcher never branches on provider identity. The
//! eleven providers collapse into four wire families: OpenAI-compatible
//! chat completions (most of them), Anthropic messages, Google
//! generateContent, and Cohere chat.
//!
//! Adapters never retry; retry policy belongs to the worker. Rotation
//! across multiple credentials for one provider happens here, round-robin,
//! invisible to the orchestrator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use shared::{ApiFailure, ProviderId, RawResponse};
use tokio::time::Instant;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ProviderAdapter;

/// Wire format family a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    OpenAiChat,
    AnthropicMessages,
    GoogleGenerate,
    CohereChat,
}

impl ApiFamily {
    pub fn for_provider(provider: ProviderId) -> Self {
        match provider {
            ProviderId::Anthropic => ApiFamily::AnthropicMessages,
            ProviderId::Google => ApiFamily::GoogleGenerate,
            ProviderId::Cohere => ApiFamily::CohereChat,
            _ => ApiFamily::OpenAiChat,
        }
    }
}

fn default_endpoint(provider: ProviderId) -> (&'static str, &'static str) {
    match provider {
        ProviderId::OpenAI => ("https://api.openai.com/v1/chat/completions", "gpt-4o-mini"),
        ProviderId::Anthropic => ("https://api.anthropic.com/v1/messages", "claude-3-5-sonnet-20241022"),
        ProviderId::DeepSeek => ("https://api.deepseek.com/v1/chat/completions", "deepseek-chat"),
        ProviderId::Mistral => ("https://api.mistral.ai/v1/chat/completions", "mistral-large-latest"),
        ProviderId::Cohere => ("https://api.cohere.ai/v1/chat", "command-r-plus"),
        ProviderId::AI21 => ("https://api.ai21.com/studio/v1/chat/completions", "jamba-1.5-large"),
        ProviderId::Google => (
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent",
            "gemini-1.5-flash",
        ),
        ProviderId::Groq => ("https://api.groq.com/openai/v1/chat/completions", "llama-3.1-70b-versatile"),
        ProviderId::Together => (
            "https://api.together.xyz/v1/chat/completions",
            "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
        ),
        ProviderId::Perplexity => (
            "https://api.perplexity.ai/chat/completions",
            "llama-3.1-sonar-small-128k-online",
        ),
        ProviderId::XAI => ("https://api.x.ai/v1/chat/completions", "grok-2-1212"),
    }
}

/// Real provider adapter speaking one provider's HTTP API
pub struct HttpProviderAdapter {
    provider: ProviderId,
    family: ApiFamily,
    base_url: String,
    model: String,
    keys: Vec<String>,
    next_key: AtomicUsize,
    client: reqwest::Client,
    max_tokens: u32,
}

impl HttpProviderAdapter {
    /// Build an adapter with the provider's production endpoint and model
    pub fn new(provider: ProviderId, keys: Vec<String>) -> OrchestratorResult<Arc<Self>> {
        let (base_url, model) = default_endpoint(provider);
        Self::with_endpoint(provider, keys, base_url.to_string(), model.to_string())
    }

    /// Build an adapter against an explicit endpoint (tests, proxies)
    pub fn with_endpoint(
        provider: ProviderId,
        keys: Vec<String>,
        base_url: String,
        model: String,
    ) -> OrchestratorResult<Arc<Self>> {
        if keys.is_empty() || keys.iter().any(|k| k.is_empty()) {
            return Err(OrchestratorError::ConfigurationError {
                field: format!("{provider}.api_keys"),
            });
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| OrchestratorError::ConfigurationError {
                field: format!("{provider}.http_client: {e}"),
            })?;
        Ok(Arc::new(Self {
            provider,
            family: ApiFamily::for_provider(provider),
            base_url,
            model,
            keys,
            next_key: AtomicUsize::new(0),
            client,
            max_tokens: 500,
        }))
    }

    /// Round-robin over the configured credentials
    pub(crate) fn next_key(&self) -> &str {
        let index = self.next_key.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        &self.keys[index]
    }

    fn build_payload(&self, subject: &str) -> Value {
        let prompt = format!("Tell me everything you know about: {subject}");
        match self.family {
            ApiFamily::OpenAiChat => json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": self.max_tokens,
                "temperature": 0.7
            }),
            ApiFamily::AnthropicMessages => json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": self.max_tokens
            }),
            ApiFamily::GoogleGenerate => json!({
                "contents": [{"parts": [{"text": prompt}]}],
                "generationConfig": {"maxOutputTokens": self.max_tokens, "temperature": 0.7}
            }),
            ApiFamily::CohereChat => json!({
                "model": self.model,
                "message": prompt,
                "max_tokens": self.max_tokens
            }),
        }
    }

    fn classify_status(status: reqwest::StatusCode) -> ApiFailure {
        match status.as_u16() {
            401 | 403 => ApiFailure::AuthenticationFailed,
            429 => ApiFailure::RateLimitExceeded,
            503 => ApiFailure::ServiceUnavailable,
            _ => ApiFailure::ServerError(status.to_string()),
        }
    }
}

/// Pull the answer text out of a provider response body
pub fn extract_content(family: ApiFamily, body: &Value) -> Result<String, ApiFailure> {
    let content = match family {
        ApiFamily::OpenAiChat => body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str()),
        ApiFamily::AnthropicMessages => body
            .get("content")
            .and_then(|content| content.get(0))
            .and_then(|item| item.get("text"))
            .and_then(|text| text.as_str()),
        ApiFamily::GoogleGenerate => body
            .get("candidates")
            .and_then(|candidates| candidates.get(0))
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(|text| text.as_str()),
        ApiFamily::CohereChat => body.get("text").and_then(|text| text.as_str()),
    };
    content
        .map(str::to_string)
        .ok_or_else(|| ApiFailure::MalformedResponse("no content in response".to_string()))
}

#[async_trait::async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    async fn send(&self, subject: &str, timeout: Duration) -> Result<RawResponse, ApiFailure> {
        let key = self.next_key();
        let payload = self.build_payload(subject);
        let started = Instant::now();

        let mut request = self.client.post(&self.base_url).timeout(timeout).json(&payload);
        request = match self.family {
            ApiFamily::AnthropicMessages => request
                .header("x-api-key", key)
                .header("anthropic-version", "2023-06-01"),
            // Google authenticates through a query parameter
            ApiFamily::GoogleGenerate => request.query(&[("key", key)]),
            ApiFamily::OpenAiChat | ApiFamily::CohereChat => {
                request.header("Authorization", format!("Bearer {key}"))
            }
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiFailure::Timeout
            } else {
                ApiFailure::NetworkError(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(Self::classify_status(response.status()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiFailure::MalformedResponse(format!("invalid JSON: {e}")))?;
        let content = extract_content(self.family, &body)?;

        Ok(RawResponse {
            provider: self.provider,
            model: self.model.clone(),
            content,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

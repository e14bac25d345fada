//! Environment-based API key loading
//!
//! Keys come from the process environment, with a `.env` file picked up
//! when present (environment variables win). A provider may carry several
//! credentials via numbered suffixes (`OPENAI_API_KEY`, `OPENAI_API_KEY_2`,
//! ...); the adapter rotates over them round-robin. Providers without any
//! key are simply absent from the result: the orchestrator degrades
//! coverage rather than refusing to start.

use std::collections::HashMap;

use shared::ProviderId;
use tracing::info;

/// Highest numbered rotation suffix probed per provider
const MAX_ROTATED_KEYS: u32 = 5;

pub struct EnvApiKeys;

impl EnvApiKeys {
    fn env_name(provider: ProviderId) -> &'static str {
        match provider {
            ProviderId::OpenAI => "OPENAI_API_KEY",
            ProviderId::Anthropic => "ANTHROPIC_API_KEY",
            ProviderId::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderId::Mistral => "MISTRAL_API_KEY",
            ProviderId::Cohere => "COHERE_API_KEY",
            ProviderId::AI21 => "AI21_API_KEY",
            ProviderId::Google => "GOOGLE_API_KEY",
            ProviderId::Groq => "GROQ_API_KEY",
            ProviderId::Together => "TOGETHER_API_KEY",
            ProviderId::Perplexity => "PERPLEXITY_API_KEY",
            ProviderId::XAI => "XAI_API_KEY",
        }
    }

    /// Collect every configured credential, grouped by provider
    pub fn load() -> HashMap<ProviderId, Vec<String>> {
        // Safe to call repeatedly; already-set variables are left alone
        let _ = dotenv::dotenv();

        let mut keys = HashMap::new();
        for provider in ProviderId::ALL {
            let name = Self::env_name(provider);
            let mut provider_keys = Vec::new();
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    provider_keys.push(value);
                }
            }
            for n in 2..=MAX_ROTATED_KEYS {
                if let Ok(value) = std::env::var(format!("{name}_{n}")) {
                    if !value.is_empty() {
                        provider_keys.push(value);
                    }
                }
            }
            if !provider_keys.is_empty() {
                keys.insert(provider, provider_keys);
            }
        }

        info!(
            "🔑 {} of {} providers have credentials configured",
            keys.len(),
            ProviderId::ALL.len()
        );
        keys
    }
}

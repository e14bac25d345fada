//! Main entry point for the orchestrator binary
//!
//! Wires the real services together: environment credentials feed the
//! provider registry, each subject becomes one job fanned out across the
//! configured providers, and the terminal decision for every job is
//! printed once its synchronization window closes.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::future::join_all;
use tracing::{info, warn};

use orchestrator::{
    AcquirePolicy, DispatchConfig, Dispatcher, EnvApiKeys, HealthReporter, HttpProviderAdapter,
    MemoryResultSink, OrchestratorError, OrchestratorResult, ProviderConfig, ProviderRegistry,
    TracingHealthSink,
};

/// Fan one or more subjects out across every configured LLM provider and
/// report whether each result set completed inside its time window
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Dispatches subjects to all configured LLM providers and validates completeness")]
pub struct Args {
    /// Subjects to query, one job each
    #[arg(required = true)]
    pub subjects: Vec<String>,

    /// Synchronization window in seconds
    #[arg(long, default_value = "300")]
    pub window_secs: u64,

    /// Per-call timeout in seconds
    #[arg(long, default_value = "30")]
    pub call_timeout_secs: u64,

    /// Skip providers without free capacity instead of waiting for them
    #[arg(long)]
    pub non_blocking: bool,

    /// Seconds between provider health snapshots
    #[arg(long, default_value = "15")]
    pub health_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> OrchestratorResult<()> {
    let args = Args::parse();
    shared::logging::init_tracing_with_level(Some(&args.log_level));

    // one registry entry per provider with credentials
    let keys = EnvApiKeys::load();
    let mut entries = Vec::new();
    for provider in shared::ProviderId::ALL {
        let Some(provider_keys) = keys.get(&provider) else {
            continue;
        };
        let mut config = ProviderConfig::production_defaults(provider);
        config.call_timeout = Duration::from_secs(args.call_timeout_secs);
        let adapter = HttpProviderAdapter::new(provider, provider_keys.clone())?;
        entries.push((config, adapter as Arc<dyn orchestrator::ProviderAdapter>));
    }
    if entries.is_empty() {
        warn!("no provider credentials configured, nothing to dispatch to");
        return Err(OrchestratorError::NoProvidersConfigured);
    }

    let registry = Arc::new(ProviderRegistry::new(entries)?);
    info!(
        "🤖 {} providers registered, minimum viable window {:?}",
        registry.len(),
        registry.min_viable_deadline()
    );

    let sink = Arc::new(MemoryResultSink::new());
    let config = DispatchConfig {
        sync_window: Duration::from_secs(args.window_secs),
        acquire_policy: if args.non_blocking {
            AcquirePolicy::NonBlocking
        } else {
            AcquirePolicy::Block
        },
    };
    let dispatcher = Arc::new(Dispatcher::new(registry.clone(), sink.clone(), config));

    let health = HealthReporter::new(
        registry,
        Arc::new(TracingHealthSink),
        Duration::from_secs(args.health_interval_secs),
    )
    .spawn();

    // one job per subject, all running against the same provider set
    let jobs = args.subjects.iter().map(|subject| {
        let dispatcher = dispatcher.clone();
        async move { (subject.clone(), dispatcher.run_job(subject, None).await) }
    });

    for (subject, result) in join_all(jobs).await {
        match result {
            Ok(outcome) => {
                info!(
                    "✅ \"{subject}\" -> {:?}: coverage {:.0}% ({}/{})",
                    outcome.status,
                    outcome.coverage * 100.0,
                    outcome.success_count,
                    outcome.expected_count
                );
            }
            Err(e) => warn!("❌ \"{subject}\" failed to run: {e}"),
        }
    }

    health.abort();
    Ok(())
}

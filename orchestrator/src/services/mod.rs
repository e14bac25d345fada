//! Service implementations
//!
//! Production implementations of the capability traits plus the provider
//! registry they hang off: HTTP adapters, credential loading, the
//! in-memory sink, and health reporting.

pub mod adapters;
pub mod api_keys;
pub mod health;
pub mod registry;
pub mod sink;

#[cfg(test)]
pub mod tests;

pub use adapters::HttpProviderAdapter;
pub use api_keys::EnvApiKeys;
pub use health::{HealthReporter, TracingHealthSink};
pub use registry::{ProviderConfig, ProviderHandle, ProviderRegistry};
pub use sink::MemoryResultSink;

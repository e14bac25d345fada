//! Shared vocabulary for the multi-provider dispatch system
//!
//! Contains only truly shared types: provider identifiers and tiers, job and
//! attempt records, the adapter failure taxonomy, and tracing setup.
//! Component-internal types stay in their respective crates.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;

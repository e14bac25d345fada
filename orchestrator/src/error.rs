//! Orchestrator-specific error types

use shared::{JobId, SharedError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Job subject must not be empty")]
    InvalidSubject,

    #[error("Deadline {requested:?} is below the minimum viable window {minimum:?}")]
    InvalidDeadline { requested: Duration, minimum: Duration },

    #[error("Unknown job: {job_id}")]
    JobNotFound { job_id: JobId },

    #[error("Job {job_id} was never dispatched or its outcome was already consumed")]
    OutcomeUnavailable { job_id: JobId },

    #[error("No providers configured")]
    NoProvidersConfigured,

    #[error("Result sink rejected write: {message}")]
    SinkError { message: String },

    #[error("Health reporting failed: {message}")]
    HealthError { message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

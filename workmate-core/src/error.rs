//! Error types for the workmate ecosystem.

use thiserror::Error;

/// Errors that can occur in workmate operations.
#[derive(Error, Debug)]
pub enum WorkmateError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Remote API error: {0}")]
    RemoteApi(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Event {0} is not in conflict state")]
    ConflictState(String),

    #[error("Pipeline stage '{stage}' failed: {message}")]
    PipelineStage { stage: String, message: String },

    #[error("Integration '{0}' is disabled. Use force to sync anyway")]
    IntegrationDisabled(String),

    #[error("No provider available for integration type '{0}'")]
    UnsupportedProvider(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WorkmateError {
    /// Only authentication failures abort a sync pass; everything else is
    /// recorded per item and revisited on the next pass.
    pub fn is_fatal_for_pass(&self) -> bool {
        matches!(self, WorkmateError::Authentication(_))
    }

    pub fn stage(stage: &str, err: impl std::fmt::Display) -> Self {
        WorkmateError::PipelineStage {
            stage: stage.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for WorkmateError {
    fn from(e: serde_json::Error) -> Self {
        WorkmateError::Serialization(e.to_string())
    }
}

/// Result type alias for workmate operations.
pub type WorkmateResult<T> = Result<T, WorkmateError>;

//! Error types shared across the orchestrator core.

use std::time::Duration;

use thiserror::Error;

/// Failure of a subprocess run by a batch-system adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command `{command}` exited with status {exit_code}: {stderr}")]
pub struct ExecutionError {
    pub command: String,
    pub exit_code: i32,
    pub stderr: String,
}

/// Errors surfaced by site and batch-system agents.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// Credentials rejected by the remote endpoint.
    #[error("credentials rejected: {0}")]
    Auth(String),

    /// No response within the call deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Any other site-level failure. Fatal for the affected drone.
    #[error("site agent failure: {0}")]
    Site(String),

    /// Any other batch-system failure. Fatal for the affected drone.
    #[error("batch system failure: {0}")]
    Batch(String),

    /// A batch adapter subprocess failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl AgentError {
    /// Whether the state machine may absorb this failure where its
    /// transition table has a self-loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Auth(_) | AgentError::Timeout(_))
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Errors surfaced by the drone registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AgentError::Auth("rejected".to_string()).is_retryable());
        assert!(AgentError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!AgentError::Site("boom".to_string()).is_retryable());
        assert!(!AgentError::Batch("boom".to_string()).is_retryable());
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError {
            command: "sinfo".to_string(),
            exit_code: 1,
            stderr: "no such partition".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command `sinfo` exited with status 1: no such partition"
        );
        assert!(!AgentError::from(err).is_retryable());
    }
}

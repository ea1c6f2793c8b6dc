//! Shell command execution port used by subprocess-backed adapters.

use async_trait::async_trait;

use crate::domain::errors::ExecutionError;

/// Runs a shell command and returns its stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<String, ExecutionError>;
}

//! Shell command execution for subprocess-backed adapters.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use crate::domain::errors::ExecutionError;
use crate::domain::ports::CommandRunner;

/// Runs commands through `sh -c`, capturing stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCommandRunner;

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str) -> Result<String, ExecutionError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|err| ExecutionError {
                command: command.to_string(),
                exit_code: -1,
                stderr: err.to_string(),
            })?;

        if !output.status.success() {
            let failure = ExecutionError {
                command: command.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            warn!(command, exit_code = failure.exit_code, "command failed");
            return Err(failure);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

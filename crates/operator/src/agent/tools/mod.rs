//! Investigation tool catalog.
//!
//! Collaborator modules the investigation agent drives: Helm release
//! inspection, GitHub lookups, log analysis, and the markdown knowledge
//! base. Every tool call returns formatted text or a typed error; nothing
//! here signals failure across a subprocess or HTTP boundary by panicking.

pub mod github;
pub mod helm;
pub mod logs;
pub mod memory;

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("command timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("command failed: {0}")]
    Command(String),
    #[error("failed to parse output: {0}")]
    Parse(String),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("access forbidden or rate limit exceeded: {0}")]
    Forbidden(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ToolResult = std::result::Result<String, ToolError>;

/// Captured output of one external command.
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Run an external command with a hard timeout. The child is killed if the
/// timeout fires before it exits.
pub(crate) async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> std::result::Result<CommandOutput, ToolError> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => Err(ToolError::Timeout(timeout)),
        Ok(Err(e)) => Err(ToolError::Io(e)),
        Ok(Ok(output)) => Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        }),
    }
}

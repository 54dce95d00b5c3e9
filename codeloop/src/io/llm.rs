//! Language-model port and the subprocess-backed default adapter.
//!
//! The [`LanguageModel`] trait decouples the agents from the actual model
//! backend. Tests use scripted models that return predetermined completions
//! without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::error::ModelError;
use crate::io::process::run_command_with_timeout;

/// Abstract text-completion capability consumed by every agent.
pub trait LanguageModel {
    /// Return a completion for `prompt`, or fail with a [`ModelError`]-class
    /// error on transport failure.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Model adapter that spawns a configured command, feeds the prompt on stdin,
/// and reads the completion from stdout.
#[derive(Debug, Clone)]
pub struct CommandModel {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandModel {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Result<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(ModelError::new("model command must be non-empty").into());
        }
        Ok(Self {
            command,
            timeout,
            output_limit_bytes,
        })
    }
}

impl LanguageModel for CommandModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        info!(command = %self.command[0], prompt_bytes = prompt.len(), "invoking model command");

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);

        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| ModelError::new(format!("model command failed to run: {err:#}")))?;

        if output.timed_out {
            return Err(ModelError::new(format!(
                "model command timed out after {:?}",
                self.timeout
            ))
            .into());
        }
        if !output.status.success() {
            return Err(ModelError::new(format!(
                "model command exited with status {:?}: {}",
                output.status.code(),
                output.stderr_lossy().trim()
            ))
            .into());
        }

        debug!(completion_bytes = output.stdout.len(), "model completion received");
        Ok(output.stdout_lossy())
    }
}

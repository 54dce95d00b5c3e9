//! Copy-on-execute test sandbox.
//!
//! Each execution materializes the baseline codebase plus the attempt's
//! modified files into a fresh temporary directory, writes the test source
//! next to them, and runs the configured command there. The baseline snapshot
//! is never mutated and the directory is removed afterwards, so one attempt's
//! execution is invisible to every other attempt.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::files::FileMap;
use crate::core::types::CodeFile;
use crate::io::process::run_command_with_timeout;

/// Raw result of one sandboxed execution, before protocol parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub exit_success: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Abstraction over test execution backends.
pub trait Sandbox {
    /// Execute `test_code` against the baseline codebase overlaid with
    /// `changes`. Must guarantee no persistent side effects outside the
    /// sandbox.
    fn execute(
        &self,
        baseline: &[CodeFile],
        changes: &FileMap,
        test_code: &str,
    ) -> Result<ExecutionOutcome>;
}

/// Sandbox that runs tests as a child process in a temporary directory.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    command: Vec<String>,
    test_file_name: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ProcessSandbox {
    pub fn new(
        command: Vec<String>,
        test_file_name: impl Into<String>,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(anyhow!("sandbox command must be non-empty"));
        }
        let test_file_name = test_file_name.into();
        if test_file_name.trim().is_empty() || test_file_name.contains('/') {
            return Err(anyhow!("sandbox test file name must be a bare file name"));
        }
        Ok(Self {
            command,
            test_file_name,
            timeout,
            output_limit_bytes,
        })
    }
}

impl Sandbox for ProcessSandbox {
    fn execute(
        &self,
        baseline: &[CodeFile],
        changes: &FileMap,
        test_code: &str,
    ) -> Result<ExecutionOutcome> {
        let temp = tempfile::tempdir().context("create sandbox directory")?;

        for file in baseline {
            write_sandbox_file(temp.path(), &file.path, &file.content)?;
        }
        for file in changes.iter() {
            write_sandbox_file(temp.path(), &file.path, &file.content)?;
        }
        write_sandbox_file(temp.path(), &self.test_file_name, test_code)?;

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .arg(&self.test_file_name)
            .current_dir(temp.path());

        debug!(
            command = %self.command[0],
            files = baseline.len() + changes.len(),
            "executing tests in sandbox"
        );
        let output =
            run_command_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)?;

        Ok(ExecutionOutcome {
            exit_success: output.status.success(),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            timed_out: output.timed_out,
        })
    }
}

/// Write one file under the sandbox root, rejecting paths that would escape it.
fn write_sandbox_file(root: &Path, rel_path: &str, content: &str) -> Result<()> {
    if Path::new(rel_path).is_absolute() || rel_path.split('/').any(|part| part == "..") {
        return Err(anyhow!("refusing to write outside sandbox: '{rel_path}'"));
    }
    let full = root.join(rel_path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create sandbox dir {}", parent.display()))?;
    }
    fs::write(&full, content).with_context(|| format!("write {}", full.display()))
}

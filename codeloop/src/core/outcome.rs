//! Result aggregates produced as tasks and projects finish.

use serde::{Deserialize, Serialize};

use crate::core::files::FileMap;
use crate::core::types::{CodeFile, GeneratedCode, Project, Task, TestResult};

/// Why a task loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// All tests passed on the final attempt.
    Converged,
    /// The attempt budget ran out with tests still failing.
    AttemptsExhausted,
    /// A delegate agent failed structurally (unparsable output, backend
    /// failure). Not retried within the task loop.
    AgentFailure,
    /// Cancellation took effect at an attempt boundary.
    Cancelled,
}

/// Terminal outcome of one task's generate/test/revise loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: Task,
    /// Last generated change set, converged or not. `None` only when the
    /// first generation itself failed.
    pub final_code: Option<GeneratedCode>,
    pub passed_tests: Vec<TestResult>,
    pub failed_tests: Vec<TestResult>,
    pub attempts: u32,
    pub converged: bool,
    pub stop_reason: StopReason,
}

/// Aggregated outcome of a whole project execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectResult {
    pub project: Project,
    /// One result per executed task, in project order. Tasks skipped by
    /// cancellation have no entry.
    pub task_results: Vec<TaskResult>,
    /// Merged file map across tasks, later tasks overriding earlier ones.
    pub modified_files: FileMap,
    /// Ordered audit trail of every decision point in the run.
    pub thought_process: Vec<String>,
}

impl ProjectResult {
    /// Baseline files no task ended up touching.
    pub fn unchanged_files(&self, codebase: &[CodeFile]) -> Vec<CodeFile> {
        codebase
            .iter()
            .filter(|f| !self.modified_files.contains(&f.path))
            .cloned()
            .collect()
    }
}

/// Top-level run outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    pub project_result: ProjectResult,
    /// Holds iff every task result converged.
    pub overall_success: bool,
}

impl FinalResult {
    pub fn from_project_result(project_result: ProjectResult) -> Self {
        let executed_all =
            project_result.task_results.len() == project_result.project.tasks.len();
        let overall_success =
            executed_all && project_result.task_results.iter().all(|tr| tr.converged);
        Self {
            project_result,
            overall_success,
        }
    }
}

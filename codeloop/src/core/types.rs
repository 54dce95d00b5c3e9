//! Shared deterministic types for the pipeline core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use serde::{Deserialize, Serialize};

use crate::core::files::FileMap;

/// Immutable snapshot of one file's contents at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFile {
    pub path: String,
    pub content: String,
}

impl CodeFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// What kind of change a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CodeImplementation,
    Refactor,
    Bugfix,
    TestAddition,
}

impl TaskKind {
    /// Cross-cutting kinds may touch files outside the task's declared set.
    pub fn is_cross_cutting(self) -> bool {
        matches!(self, TaskKind::TestAddition)
    }
}

/// Planner-estimated effort for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Lifecycle state of a task. Transitions are forward-only:
/// `Pending -> InProgress -> {Succeeded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Succeeded)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

fn default_complexity() -> Complexity {
    Complexity::Medium
}

/// Atomic unit of work within a project, scoped to a description and a set of
/// files. Created by the planner; status is mutated only by the task loop and
/// only forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub kind: TaskKind,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default = "default_complexity")]
    pub estimated_complexity: Complexity,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
}

impl Task {
    /// Advance the task status, rejecting backward or skipped transitions.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "invalid status transition for task '{}': {:?} -> {:?}",
                self.id, self.status, next
            ));
        }
        self.status = next;
        Ok(())
    }

    /// Whether `path` is inside the task's declared file set.
    pub fn allows_path(&self, path: &str) -> bool {
        self.kind.is_cross_cutting() || self.file_paths.iter().any(|p| p == path)
    }
}

/// Ordered collection of tasks derived from a single change request.
///
/// Ordering is execution order as proposed by the planner. The project is
/// immutable after creation except for each task's status field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub source_query: String,
    pub tasks: Vec<Task>,
}

impl Project {
    /// Build a project, validating the task set is non-empty with unique ids.
    pub fn new(
        id: impl Into<String>,
        source_query: impl Into<String>,
        tasks: Vec<Task>,
    ) -> Result<Self, String> {
        if tasks.is_empty() {
            return Err("project must contain at least one task".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for task in &tasks {
            if task.id.trim().is_empty() {
                return Err("task id must be non-empty".to_string());
            }
            if task.description.trim().is_empty() {
                return Err(format!("task '{}' has an empty description", task.id));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(format!("duplicate task id '{}'", task.id));
            }
        }
        Ok(Self {
            id: id.into(),
            source_query: source_query.into(),
            tasks,
        })
    }
}

/// One attempt's proposed file modifications plus rationale.
///
/// Instances are immutable; a revision is a new instance appended to the
/// task's revision log, never an in-place edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub task_id: String,
    pub modified_files: FileMap,
    pub rationale: String,
}

/// Outcome of one executed test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl TestResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: String::new(),
        }
    }

    pub fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

//! Append-only revision history for one task's generated code.
//!
//! Each revision is a new [`GeneratedCode`] appended after its predecessor,
//! forming a single linear chain. Keeping the chain as an explicit log (never
//! mutating prior entries) keeps the audit trail reconstructable.

use crate::core::types::GeneratedCode;

/// Linear chain of generation attempts for a single task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionLog {
    task_id: String,
    attempts: Vec<GeneratedCode>,
}

impl RevisionLog {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            attempts: Vec::new(),
        }
    }

    /// Append a revision, enforcing the chain invariants: the code belongs to
    /// this task, and a revision's file set never shrinks relative to its
    /// predecessor (same key set or superset).
    pub fn push(&mut self, code: GeneratedCode) -> Result<(), String> {
        if code.task_id != self.task_id {
            return Err(format!(
                "revision for task '{}' pushed onto log for task '{}'",
                code.task_id, self.task_id
            ));
        }
        if let Some(previous) = self.attempts.last()
            && !code.modified_files.covers(&previous.modified_files)
        {
            return Err(format!(
                "revision for task '{}' dropped files from its predecessor",
                self.task_id
            ));
        }
        self.attempts.push(code);
        Ok(())
    }

    pub fn latest(&self) -> Option<&GeneratedCode> {
        self.attempts.last()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedCode> {
        self.attempts.iter()
    }
}

//! Ordered, append-only thought-process trace.
//!
//! The trace is product output (it ends up in `ProjectResult.thought_process`
//! for audit), distinct from dev-time `tracing` diagnostics. Every decision
//! point in a run appends one human-readable entry here.

use tracing::debug;

/// Append-only log of decision-point entries, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThoughtLog {
    entries: Vec<String>,
}

impl ThoughtLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decision-point entry.
    pub fn reflect(&mut self, thought: impl Into<String>) {
        let thought = thought.into();
        debug!(thought = %thought, "reflection");
        self.entries.push(thought);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

//! Pipeline entry point: plan a change request, execute the project, report
//! the final result.
//!
//! The orchestrator owns no agent logic. It wires the three capability
//! interfaces together, applies the configured limits, and decides only one
//! policy itself: a planner failure fails the whole run immediately, because
//! without a plan there is nothing to execute partially.

use anyhow::{Context, Result};
use tracing::info;

use crate::agents::{Coder, Planner, Tester};
use crate::core::cancel::CancelFlag;
use crate::core::outcome::FinalResult;
use crate::core::types::CodeFile;
use crate::io::config::PipelineConfig;
use crate::project::run_project;

pub struct Orchestrator<P: Planner, C: Coder, T: Tester> {
    planner: P,
    coder: C,
    tester: T,
    config: PipelineConfig,
}

impl<P: Planner, C: Coder, T: Tester> Orchestrator<P, C, T> {
    pub fn new(planner: P, coder: C, tester: T, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            planner,
            coder,
            tester,
            config,
        })
    }

    /// Run the full pipeline for one change request.
    pub fn run(&self, query: &str, codebase: &[CodeFile]) -> Result<FinalResult> {
        self.run_with_cancel(query, codebase, &CancelFlag::new())
    }

    /// Run the full pipeline with an externally controlled cancellation flag.
    pub fn run_with_cancel(
        &self,
        query: &str,
        codebase: &[CodeFile],
        cancel: &CancelFlag,
    ) -> Result<FinalResult> {
        info!(query_bytes = query.len(), files = codebase.len(), "pipeline started");

        let project = self
            .planner
            .create_plan(query, codebase, self.config.max_tasks)
            .context("planning stage")?;

        let project_result = run_project(
            &self.coder,
            &self.tester,
            project,
            codebase,
            self.config.max_attempts_per_task,
            cancel,
        )?;

        let final_result = FinalResult::from_project_result(project_result);
        info!(
            overall_success = final_result.overall_success,
            modified_files = final_result.project_result.modified_files.len(),
            "pipeline finished"
        );
        Ok(final_result)
    }
}

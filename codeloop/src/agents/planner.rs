//! Model-backed planner: change request in, validated project out.

use anyhow::Result;
use serde::Deserialize;
use tracing::{info, warn};

use crate::agents::{Planner, parse_validated};
use crate::core::types::{CodeFile, Project, Task, TaskStatus};
use crate::error::{EmptyPlanError, PlanningError};
use crate::io::llm::LanguageModel;
use crate::io::prompt::PromptBuilder;

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan_output.schema.json");

#[derive(Debug, Deserialize)]
struct PlanOutput {
    tasks: Vec<Task>,
}

/// Decomposes a change request into an ordered project by prompting the model
/// and validating its output against the plan schema.
pub struct PlannerAgent<'a, M: LanguageModel> {
    model: &'a M,
    prompts: PromptBuilder,
}

impl<'a, M: LanguageModel> PlannerAgent<'a, M> {
    pub fn new(model: &'a M, prompts: PromptBuilder) -> Self {
        Self { model, prompts }
    }
}

impl<M: LanguageModel> Planner for PlannerAgent<'_, M> {
    fn create_plan(
        &self,
        request: &str,
        codebase: &[CodeFile],
        max_tasks: usize,
    ) -> Result<Project> {
        if request.trim().is_empty() {
            return Err(PlanningError::new("change request must be non-empty").into());
        }
        if max_tasks == 0 {
            return Err(PlanningError::new("max_tasks must be at least 1").into());
        }

        let prompt = self.prompts.build_planner(request, codebase, max_tasks);
        let completion = self.model.complete(&prompt)?;

        let output: PlanOutput = parse_validated(&completion, PLAN_SCHEMA, "plan")
            .map_err(PlanningError::new)?;
        if output.tasks.is_empty() {
            return Err(EmptyPlanError.into());
        }

        let mut tasks = output.tasks;
        if tasks.len() > max_tasks {
            warn!(
                planned = tasks.len(),
                max_tasks, "plan exceeds task limit, truncating"
            );
            tasks.truncate(max_tasks);
        }
        // The model has no say over lifecycle state.
        for task in &mut tasks {
            task.status = TaskStatus::Pending;
        }

        let project =
            Project::new(project_id(request), request.trim(), tasks).map_err(PlanningError::new)?;
        info!(project = %project.id, tasks = project.tasks.len(), "plan created");
        Ok(project)
    }
}

/// Deterministic project id derived from the request text.
fn project_id(request: &str) -> String {
    let slug: String = request
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug: String = slug.split('-').filter(|s| !s.is_empty()).take(6).collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        "project".to_string()
    } else {
        format!("project-{slug}")
    }
}

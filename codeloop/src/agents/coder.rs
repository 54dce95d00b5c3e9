//! Model-backed coder: generates a change set for a task and revises it
//! against test failures.

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

use crate::agents::{Coder, parse_validated};
use crate::core::files::FileMap;
use crate::core::types::{CodeFile, GeneratedCode, Task, TestResult};
use crate::error::GenerationError;
use crate::io::llm::LanguageModel;
use crate::io::prompt::PromptBuilder;

const CODE_SCHEMA: &str = include_str!("../../schemas/code_output.schema.json");

/// Placeholder content shown to the model for a declared path that does not
/// exist in the codebase yet.
const NEW_FILE_MARKER: &str = "<new file - create this file>";

#[derive(Debug, Deserialize)]
struct CodeOutput {
    #[serde(default)]
    rationale: String,
    changes: Vec<CodeFile>,
}

pub struct CoderAgent<'a, M: LanguageModel> {
    model: &'a M,
    prompts: PromptBuilder,
    style_guide: String,
}

impl<'a, M: LanguageModel> CoderAgent<'a, M> {
    pub fn new(model: &'a M, prompts: PromptBuilder, style_guide: impl Into<String>) -> Self {
        Self {
            model,
            prompts,
            style_guide: style_guide.into(),
        }
    }

    /// Parse a completion into a change set, enforcing path uniqueness and
    /// the task's file scope.
    fn parse_changes(&self, completion: &str, task: &Task) -> Result<GeneratedCode> {
        let output: CodeOutput = parse_validated(completion, CODE_SCHEMA, "change set")
            .map_err(GenerationError::new)?;

        let modified_files =
            FileMap::from_files(output.changes).map_err(GenerationError::new)?;
        for path in modified_files.paths() {
            if !task.allows_path(path) {
                return Err(GenerationError::new(format!(
                    "task '{}' may not modify '{}': outside its declared file set",
                    task.id, path
                ))
                .into());
            }
        }

        Ok(GeneratedCode {
            task_id: task.id.clone(),
            modified_files,
            rationale: output.rationale,
        })
    }
}

impl<M: LanguageModel> Coder for CoderAgent<'_, M> {
    fn generate(&self, task: &Task, codebase: &[CodeFile]) -> Result<GeneratedCode> {
        // Only the task's declared files go into the prompt. Declared paths
        // missing from the codebase are files the task is expected to create.
        let mut relevant = FileMap::new();
        for path in &task.file_paths {
            let content = codebase
                .iter()
                .find(|f| &f.path == path)
                .map(|f| f.content.as_str())
                .unwrap_or(NEW_FILE_MARKER);
            relevant.insert(path.clone(), content);
        }

        info!(task = %task.id, files = relevant.len(), "generating change set");
        let prompt = self.prompts.build_coder(task, &relevant, &self.style_guide);
        let completion = self.model.complete(&prompt)?;
        self.parse_changes(&completion, task)
    }

    fn revise(
        &self,
        previous: &GeneratedCode,
        failures: &[TestResult],
        task: &Task,
    ) -> Result<GeneratedCode> {
        info!(task = %task.id, failures = failures.len(), "revising change set");
        let prompt = self.prompts.build_reviser(task, previous, failures);
        let completion = self.model.complete(&prompt)?;
        let revised = self.parse_changes(&completion, task)?;

        // A revision must carry every previously touched file forward, so the
        // revision log stays a chain of supersets.
        if !revised.modified_files.covers(&previous.modified_files) {
            let missing: Vec<&str> = previous
                .modified_files
                .paths()
                .filter(|p| !revised.modified_files.contains(p))
                .collect();
            return Err(GenerationError::new(format!(
                "revision for task '{}' dropped previously modified files: {}",
                task.id,
                missing.join(", ")
            ))
            .into());
        }

        debug!(task = %task.id, files = revised.modified_files.len(), "revision accepted");
        Ok(revised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedModel, code_file, generated, task};

    fn agent(model: &ScriptedModel) -> CoderAgent<'_, ScriptedModel> {
        CoderAgent::new(model, PromptBuilder::new(10_000), "")
    }

    fn change_completion(files: &[(&str, &str)]) -> String {
        let changes: Vec<serde_json::Value> = files
            .iter()
            .map(|(path, content)| serde_json::json!({"path": path, "content": content}))
            .collect();
        serde_json::json!({"rationale": "did the thing", "changes": changes}).to_string()
    }

    #[test]
    fn generate_parses_scoped_change_set() {
        let model = ScriptedModel::new(vec![change_completion(&[("a.py", "v1")])]);
        let mut t = task("t1");
        t.file_paths = vec!["a.py".to_string()];

        let code = agent(&model)
            .generate(&t, &[code_file("a.py", "v0")])
            .expect("generate");
        assert_eq!(code.task_id, "t1");
        assert_eq!(code.modified_files.get("a.py"), Some("v1"));
        assert_eq!(code.rationale, "did the thing");
    }

    #[test]
    fn generate_marks_declared_but_missing_files_as_new() {
        let model = ScriptedModel::new(vec![change_completion(&[("new.py", "v1")])]);
        let mut t = task("t1");
        t.file_paths = vec!["new.py".to_string()];

        agent(&model).generate(&t, &[]).expect("generate");
        let prompt = model.prompt(0);
        assert!(prompt.contains(NEW_FILE_MARKER));
    }

    #[test]
    fn out_of_scope_path_is_a_generation_error() {
        let model = ScriptedModel::new(vec![change_completion(&[("other.py", "v1")])]);
        let mut t = task("t1");
        t.file_paths = vec!["a.py".to_string()];

        let err = agent(&model).generate(&t, &[]).unwrap_err();
        let gen_err = err.downcast_ref::<GenerationError>().expect("generation error");
        assert!(gen_err.reason.contains("other.py"));
    }

    #[test]
    fn cross_cutting_tasks_may_touch_any_file() {
        let model = ScriptedModel::new(vec![change_completion(&[("tests/test_a.py", "v1")])]);
        let mut t = task("t1");
        t.kind = crate::core::types::TaskKind::TestAddition;
        t.file_paths = vec!["a.py".to_string()];

        agent(&model).generate(&t, &[]).expect("generate");
    }

    #[test]
    fn duplicate_paths_in_output_are_a_generation_error() {
        let model =
            ScriptedModel::new(vec![change_completion(&[("a.py", "v1"), ("a.py", "v2")])]);
        let mut t = task("t1");
        t.file_paths = vec!["a.py".to_string()];

        let err = agent(&model).generate(&t, &[]).unwrap_err();
        assert!(err.downcast_ref::<GenerationError>().is_some());
    }

    #[test]
    fn revision_must_cover_previous_files() {
        let model = ScriptedModel::new(vec![change_completion(&[("b.py", "v2")])]);
        let mut t = task("t1");
        t.file_paths = vec!["a.py".to_string(), "b.py".to_string()];
        let previous = generated("t1", &[("a.py", "v1")]);
        let failures = vec![TestResult::failed("test_a", "boom")];

        let err = agent(&model).revise(&previous, &failures, &t).unwrap_err();
        let gen_err = err.downcast_ref::<GenerationError>().expect("generation error");
        assert!(gen_err.reason.contains("dropped previously modified files"));
        assert!(gen_err.reason.contains("a.py"));
    }

    #[test]
    fn revision_may_grow_the_file_set_within_scope() {
        let model =
            ScriptedModel::new(vec![change_completion(&[("a.py", "v2"), ("b.py", "v1")])]);
        let mut t = task("t1");
        t.file_paths = vec!["a.py".to_string(), "b.py".to_string()];
        let previous = generated("t1", &[("a.py", "v1")]);
        let failures = vec![TestResult::failed("test_a", "boom")];

        let revised = agent(&model).revise(&previous, &failures, &t).expect("revise");
        assert!(revised.modified_files.covers(&previous.modified_files));
        assert_eq!(revised.modified_files.len(), 2);
    }

    #[test]
    fn prose_completion_is_a_generation_error() {
        let model = ScriptedModel::new(vec!["Let me think about that.".to_string()]);
        let mut t = task("t1");
        t.file_paths = vec!["a.py".to_string()];

        let err = agent(&model).generate(&t, &[]).unwrap_err();
        assert!(err.downcast_ref::<GenerationError>().is_some());
    }
}

//! Prompt builders for the planner, coder, reviser, and tester calls.
//!
//! Templates are bundled with the crate. File-content blocks are bounded by a
//! byte budget before rendering so a large codebase cannot blow up a prompt.

use minijinja::{Environment, context};
use tracing::debug;

use crate::core::files::FileMap;
use crate::core::types::{CodeFile, GeneratedCode, Task, TestResult};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const CODER_TEMPLATE: &str = include_str!("prompts/coder.md");
const REVISER_TEMPLATE: &str = include_str!("prompts/reviser.md");
const TESTER_TEMPLATE: &str = include_str!("prompts/tester.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("coder", CODER_TEMPLATE)
            .expect("coder template should be valid");
        env.add_template("reviser", REVISER_TEMPLATE)
            .expect("reviser template should be valid");
        env.add_template("tester", TESTER_TEMPLATE)
            .expect("tester template should be valid");
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> String {
        let template = self
            .env
            .get_template(name)
            .expect("bundled template should exist");
        template
            .render(ctx)
            .expect("prompt template rendering should not fail")
    }
}

/// Builds prompts with file blocks bounded by a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Prompt asking the planner to decompose a request into tasks.
    pub fn build_planner(&self, query: &str, codebase: &[CodeFile], max_tasks: usize) -> String {
        let paths: Vec<&str> = codebase.iter().map(|f| f.path.as_str()).collect();
        let paths = self.bounded(paths.join("\n"));
        PromptEngine::new().render(
            "planner",
            context! {
                query => query.trim(),
                paths => paths,
                max_tasks => max_tasks,
            },
        )
    }

    /// Prompt asking the coder for a first-attempt change set.
    pub fn build_coder(&self, task: &Task, relevant: &FileMap, style_guide: &str) -> String {
        let files = self.bounded(file_block(relevant.iter()));
        PromptEngine::new().render(
            "coder",
            context! {
                task => task,
                kind => kind_label(task),
                cross_cutting => task.kind.is_cross_cutting(),
                style_guide => non_empty(style_guide),
                files => files,
            },
        )
    }

    /// Prompt asking the coder to revise a change set against test failures.
    pub fn build_reviser(
        &self,
        task: &Task,
        previous: &GeneratedCode,
        failures: &[TestResult],
    ) -> String {
        let files = self.bounded(file_block(previous.modified_files.iter()));
        PromptEngine::new().render(
            "reviser",
            context! {
                task => task,
                files => files,
                failures => failures,
            },
        )
    }

    /// Prompt asking the tester to synthesize a test file for a change set.
    pub fn build_tester(&self, code: &GeneratedCode, test_framework: &str) -> String {
        let files = self.bounded(file_block(code.modified_files.iter()));
        PromptEngine::new().render(
            "tester",
            context! {
                rationale => code.rationale.trim(),
                files => files,
                test_framework => test_framework,
            },
        )
    }

    /// Truncate a block to the budget at a char boundary, with a marker.
    fn bounded(&self, block: String) -> String {
        if block.len() <= self.budget_bytes {
            return block;
        }
        let mut end = self.budget_bytes;
        while end > 0 && !block.is_char_boundary(end) {
            end -= 1;
        }
        let dropped = block.len() - end;
        debug!(bytes_dropped = dropped, "truncated prompt block for budget");
        format!("{}\n[truncated {} bytes]", &block[..end], dropped)
    }
}

fn file_block<'a>(files: impl Iterator<Item = &'a CodeFile>) -> String {
    let mut buf = String::new();
    for file in files {
        buf.push_str(&format!("--- {} ---\n{}\n", file.path, file.content));
    }
    buf
}

fn kind_label(task: &Task) -> String {
    // snake_case wire names double as human-readable labels
    serde_json::to_value(task.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "code_implementation".to_string())
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{code_file, generated, task};

    #[test]
    fn planner_prompt_lists_paths_not_contents() {
        let codebase = vec![
            code_file("a.py", "secret_content_a"),
            code_file("b.py", "secret_content_b"),
        ];
        let prompt = PromptBuilder::new(10_000).build_planner("add validation", &codebase, 5);

        assert!(prompt.contains("add validation"));
        assert!(prompt.contains("a.py"));
        assert!(prompt.contains("b.py"));
        assert!(!prompt.contains("secret_content_a"));
        assert!(prompt.contains("at most\n5"));
    }

    #[test]
    fn coder_prompt_carries_relevant_code_and_style_guide() {
        let mut t = task("t1");
        t.file_paths = vec!["a.py".to_string()];
        let mut relevant = FileMap::new();
        relevant.insert("a.py", "def parse(s): return int(s)");

        let prompt = PromptBuilder::new(10_000).build_coder(&t, &relevant, "prefer guard clauses");
        assert!(prompt.contains("def parse(s): return int(s)"));
        assert!(prompt.contains("prefer guard clauses"));
        assert!(prompt.contains("id: t1"));
    }

    #[test]
    fn reviser_prompt_lists_each_failure() {
        let t = task("t1");
        let previous = generated("t1", &[("a.py", "v1")]);
        let failures = vec![
            TestResult::failed("test_rejects_garbage", "ValueError not handled"),
            TestResult::failed("test_empty_input", "expected None, got crash"),
        ];

        let prompt = PromptBuilder::new(10_000).build_reviser(&t, &previous, &failures);
        assert!(prompt.contains("test_rejects_garbage: ValueError not handled"));
        assert!(prompt.contains("test_empty_input: expected None, got crash"));
        assert!(prompt.contains("--- a.py ---"));
    }

    #[test]
    fn tester_prompt_names_the_protocol_and_framework() {
        let code = generated("t1", &[("a.py", "def parse(s): ...")]);
        let prompt = PromptBuilder::new(10_000).build_tester(&code, "unittest");

        assert!(prompt.contains("TEST PASS"));
        assert!(prompt.contains("TEST FAIL"));
        assert!(prompt.contains("unittest"));
    }

    #[test]
    fn budget_truncates_file_block() {
        let t = task("t1");
        let mut relevant = FileMap::new();
        relevant.insert("big.py", "x".repeat(5_000));

        let prompt = PromptBuilder::new(500).build_coder(&t, &relevant, "");
        assert!(prompt.contains("[truncated"));
        assert!(!prompt.contains(&"x".repeat(1_000)));
    }
}

//! Capability interfaces injected into the orchestration core, plus the
//! model-backed implementations.
//!
//! The core depends only on the [`Planner`], [`Coder`], and [`Tester`]
//! traits, never on the concrete agents, so tests drive the loops with
//! scripted implementations.

use std::sync::LazyLock;

use anyhow::Result;
use jsonschema::Draft;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::types::{CodeFile, GeneratedCode, Project, Task, TestResult};

pub mod coder;
pub mod planner;
pub mod tester;

pub use coder::CoderAgent;
pub use planner::PlannerAgent;
pub use tester::TesterAgent;

/// Turns a change request plus codebase summary into an ordered project.
pub trait Planner {
    fn create_plan(&self, request: &str, codebase: &[CodeFile], max_tasks: usize)
    -> Result<Project>;
}

/// Produces and revises change sets for a single task.
pub trait Coder {
    fn generate(&self, task: &Task, codebase: &[CodeFile]) -> Result<GeneratedCode>;

    fn revise(
        &self,
        previous: &GeneratedCode,
        failures: &[TestResult],
        task: &Task,
    ) -> Result<GeneratedCode>;
}

/// Partitioned outcome of one test execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRun {
    pub passed: Vec<TestResult>,
    pub failed: Vec<TestResult>,
}

/// Synthesizes test code for a change set and executes it in isolation.
pub trait Tester {
    fn ensure_tests(&self, code: &GeneratedCode, codebase: &[CodeFile]) -> Result<String>;

    fn run(&self, code: &GeneratedCode, test_code: &str, codebase: &[CodeFile])
    -> Result<TestRun>;
}

/// Extract the JSON payload from a completion, tolerating markdown fences and
/// surrounding prose.
pub(crate) fn extract_json(completion: &str) -> Option<&str> {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

    let body = FENCE_RE
        .captures(completion)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(completion);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

/// Parse a completion as JSON, validate it against a bundled schema
/// (Draft 2020-12), and deserialize it.
pub(crate) fn parse_validated<T: DeserializeOwned>(
    completion: &str,
    schema: &str,
    what: &str,
) -> Result<T, String> {
    let payload = extract_json(completion)
        .ok_or_else(|| format!("{what}: completion contains no JSON object"))?;
    let value: Value =
        serde_json::from_str(payload).map_err(|err| format!("{what}: invalid JSON: {err}"))?;

    let schema_json: Value =
        serde_json::from_str(schema).expect("bundled schema should be valid JSON");
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema_json)
        .expect("bundled schema should compile");
    let messages: Vec<String> = compiled
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(format!(
            "{what}: schema validation failed: {}",
            messages.join("; ")
        ));
    }

    serde_json::from_value(value).map_err(|err| format!("{what}: {err}"))
}

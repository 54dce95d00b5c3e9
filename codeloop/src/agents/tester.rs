//! Model-backed tester: synthesizes a test file for a change set and runs it
//! in the sandbox, turning raw output into structured results.
//!
//! Test processes speak a line protocol on stdout:
//!
//! ```text
//! TEST PASS <name>
//! TEST FAIL <name>: <detail>
//! ```
//!
//! Anything that kills the process instead of reporting through the protocol
//! (crash, timeout) becomes a single synthetic failed test, never a system
//! error, so the revision loop always has something to react to.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::agents::{TestRun, Tester, parse_validated};
use crate::core::types::{CodeFile, GeneratedCode, TestResult};
use crate::error::GenerationError;
use crate::io::llm::LanguageModel;
use crate::io::prompt::PromptBuilder;
use crate::io::sandbox::{ExecutionOutcome, Sandbox};

const TESTS_SCHEMA: &str = include_str!("../../schemas/tests_output.schema.json");

#[derive(Debug, Deserialize)]
struct TestsOutput {
    test_code: String,
}

pub struct TesterAgent<'a, M: LanguageModel, S: Sandbox> {
    model: &'a M,
    sandbox: &'a S,
    prompts: PromptBuilder,
    test_framework: String,
}

impl<'a, M: LanguageModel, S: Sandbox> TesterAgent<'a, M, S> {
    pub fn new(
        model: &'a M,
        sandbox: &'a S,
        prompts: PromptBuilder,
        test_framework: impl Into<String>,
    ) -> Self {
        Self {
            model,
            sandbox,
            prompts,
            test_framework: test_framework.into(),
        }
    }
}

impl<M: LanguageModel, S: Sandbox> Tester for TesterAgent<'_, M, S> {
    fn ensure_tests(&self, code: &GeneratedCode, _codebase: &[CodeFile]) -> Result<String> {
        info!(task = %code.task_id, "synthesizing tests");
        let prompt = self.prompts.build_tester(code, &self.test_framework);
        let completion = self.model.complete(&prompt)?;

        let output: TestsOutput = parse_validated(&completion, TESTS_SCHEMA, "test code")
            .map_err(GenerationError::new)?;
        Ok(output.test_code)
    }

    fn run(
        &self,
        code: &GeneratedCode,
        test_code: &str,
        codebase: &[CodeFile],
    ) -> Result<TestRun> {
        let outcome = self
            .sandbox
            .execute(codebase, &code.modified_files, test_code)?;
        let run = parse_test_output(&outcome);
        info!(
            task = %code.task_id,
            passed = run.passed.len(),
            failed = run.failed.len(),
            "test execution finished"
        );
        Ok(run)
    }
}

static RESULT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^TEST (PASS|FAIL) ([^\s:]+)(?::\s*(.*))?$").unwrap()
});

/// Parse a sandbox outcome into structured results.
///
/// A timeout or a crash without any reported failure becomes one synthetic
/// failed test. A successful exit with no protocol lines at all yields an
/// empty run; the task loop decides what that means.
pub(crate) fn parse_test_output(outcome: &ExecutionOutcome) -> TestRun {
    if outcome.timed_out {
        return TestRun {
            passed: Vec::new(),
            failed: vec![TestResult::failed(
                "test-execution-timeout",
                "test process exceeded its time limit",
            )],
        };
    }

    let mut run = TestRun::default();
    for line in outcome.stdout.lines() {
        let Some(caps) = RESULT_LINE_RE.captures(line.trim_end()) else {
            continue;
        };
        let name = &caps[2];
        match &caps[1] {
            "PASS" => run.passed.push(TestResult::passed(name)),
            _ => {
                let detail = caps.get(3).map(|m| m.as_str()).unwrap_or("");
                run.failed.push(TestResult::failed(name, detail));
            }
        }
    }

    // Nonzero exit with no reported failure means the process died before
    // the protocol could speak. Surface it as one failed test.
    if !outcome.exit_success && run.failed.is_empty() {
        let detail = if outcome.stderr.trim().is_empty() {
            "test process exited with a nonzero status".to_string()
        } else {
            outcome.stderr.trim().to_string()
        };
        warn!("test process crashed without reporting failures");
        run.failed.push(TestResult::failed("test-execution-crash", detail));
    }

    debug!(passed = run.passed.len(), failed = run.failed.len(), "parsed test output");
    run
}

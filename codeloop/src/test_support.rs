//! Scripted agent and port implementations plus fixture builders for tests.
//!
//! Available to integration tests through the `test-support` feature. The
//! scripted doubles consume queued responses in order; a double asked for
//! more responses than it was scripted with panics, except [`ScriptedModel`],
//! which fails with a [`ModelError`] so transport-failure paths can be tested.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::Result;

use crate::agents::{Coder, Planner, TestRun, Tester};
use crate::core::files::FileMap;
use crate::core::outcome::{StopReason, TaskResult};
use crate::core::types::{
    CodeFile, Complexity, GeneratedCode, Project, Task, TaskKind, TaskStatus, TestResult,
};
use crate::error::ModelError;
use crate::io::llm::LanguageModel;
use crate::io::sandbox::{ExecutionOutcome, Sandbox};

pub fn code_file(path: &str, content: impl Into<String>) -> CodeFile {
    CodeFile::new(path, content.into())
}

pub fn task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        description: format!("scripted task {id}"),
        kind: TaskKind::CodeImplementation,
        file_paths: Vec::new(),
        estimated_complexity: Complexity::Medium,
        status: TaskStatus::Pending,
    }
}

pub fn generated(task_id: &str, files: &[(&str, &str)]) -> GeneratedCode {
    let mut modified_files = FileMap::new();
    for (path, content) in files {
        modified_files.insert(*path, *content);
    }
    GeneratedCode {
        task_id: task_id.to_string(),
        modified_files,
        rationale: format!("scripted change for {task_id}"),
    }
}

pub fn converged_result(task_id: &str) -> TaskResult {
    let mut t = task(task_id);
    t.status = TaskStatus::Succeeded;
    TaskResult {
        task: t,
        final_code: Some(generated(task_id, &[("a.py", "v1")])),
        passed_tests: vec![TestResult::passed("test_ok")],
        failed_tests: Vec::new(),
        attempts: 1,
        converged: true,
        stop_reason: StopReason::Converged,
    }
}

pub fn failed_result(task_id: &str) -> TaskResult {
    let mut t = task(task_id);
    t.status = TaskStatus::Failed;
    TaskResult {
        task: t,
        final_code: Some(generated(task_id, &[("a.py", "v3")])),
        passed_tests: Vec::new(),
        failed_tests: vec![TestResult::failed("test_broken", "still failing")],
        attempts: 3,
        converged: false,
        stop_reason: StopReason::AttemptsExhausted,
    }
}

/// Language model returning queued completions and recording every prompt.
/// An exhausted queue fails like a broken backend.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    completions: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(completions: Vec<String>) -> Self {
        Self {
            completions: RefCell::new(completions.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Number of completions handed out so far.
    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    /// The `i`-th prompt this model received.
    pub fn prompt(&self, i: usize) -> String {
        self.prompts.borrow()[i].clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.completions
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ModelError::new("scripted model exhausted").into())
    }
}

/// Sandbox returning queued outcomes without spawning anything.
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    outcomes: RefCell<VecDeque<ExecutionOutcome>>,
}

impl ScriptedSandbox {
    pub fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
        }
    }
}

impl Sandbox for ScriptedSandbox {
    fn execute(
        &self,
        _baseline: &[CodeFile],
        _changes: &FileMap,
        _test_code: &str,
    ) -> Result<ExecutionOutcome> {
        Ok(self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("scripted sandbox exhausted")))
    }
}

/// Planner returning queued plan results.
#[derive(Default)]
pub struct ScriptedPlanner {
    plans: RefCell<VecDeque<Result<Project>>>,
}

impl ScriptedPlanner {
    pub fn new(plans: Vec<Result<Project>>) -> Self {
        Self {
            plans: RefCell::new(plans.into()),
        }
    }
}

impl Planner for ScriptedPlanner {
    fn create_plan(
        &self,
        _request: &str,
        _codebase: &[CodeFile],
        _max_tasks: usize,
    ) -> Result<Project> {
        self.plans
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("scripted planner exhausted"))
    }
}

/// Coder returning queued results for `generate` and `revise` separately.
#[derive(Default)]
pub struct ScriptedCoder {
    generations: RefCell<VecDeque<Result<GeneratedCode>>>,
    revisions: RefCell<VecDeque<Result<GeneratedCode>>>,
    revise_calls: RefCell<usize>,
}

impl ScriptedCoder {
    pub fn new(generations: Vec<Result<GeneratedCode>>, revisions: Vec<Result<GeneratedCode>>) -> Self {
        Self {
            generations: RefCell::new(generations.into()),
            revisions: RefCell::new(revisions.into()),
            revise_calls: RefCell::new(0),
        }
    }

    pub fn revise_calls(&self) -> usize {
        *self.revise_calls.borrow()
    }
}

impl Coder for ScriptedCoder {
    fn generate(&self, _task: &Task, _codebase: &[CodeFile]) -> Result<GeneratedCode> {
        self.generations
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("scripted coder exhausted (generate)"))
    }

    fn revise(
        &self,
        _previous: &GeneratedCode,
        _failures: &[TestResult],
        _task: &Task,
    ) -> Result<GeneratedCode> {
        *self.revise_calls.borrow_mut() += 1;
        self.revisions
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("scripted coder exhausted (revise)"))
    }
}

/// Tester returning queued results and recording the codebase each `run`
/// executed against.
#[derive(Default)]
pub struct ScriptedTester {
    test_codes: RefCell<VecDeque<Result<String>>>,
    runs: RefCell<VecDeque<Result<TestRun>>>,
    run_codebases: RefCell<Vec<Vec<CodeFile>>>,
}

impl ScriptedTester {
    pub fn new(test_codes: Vec<Result<String>>, runs: Vec<Result<TestRun>>) -> Self {
        Self {
            test_codes: RefCell::new(test_codes.into()),
            runs: RefCell::new(runs.into()),
            run_codebases: RefCell::new(Vec::new()),
        }
    }

    pub fn run_calls(&self) -> usize {
        self.run_codebases.borrow().len()
    }

    /// Codebase snapshot the `i`-th `run` call executed against.
    pub fn run_codebase(&self, i: usize) -> Vec<CodeFile> {
        self.run_codebases.borrow()[i].clone()
    }
}

impl Tester for ScriptedTester {
    fn ensure_tests(&self, _code: &GeneratedCode, _codebase: &[CodeFile]) -> Result<String> {
        self.test_codes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("scripted tester exhausted (ensure_tests)"))
    }

    fn run(
        &self,
        _code: &GeneratedCode,
        _test_code: &str,
        codebase: &[CodeFile],
    ) -> Result<TestRun> {
        self.run_codebases.borrow_mut().push(codebase.to_vec());
        self.runs
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("scripted tester exhausted (run)"))
    }
}

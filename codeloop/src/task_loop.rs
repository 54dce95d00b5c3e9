//! Generate/test/revise loop for a single task.
//!
//! One attempt is one generation plus one test execution. The loop converges
//! when an attempt's tests all pass, and stops when the attempt budget runs
//! out, a delegate agent fails structurally, or cancellation takes effect at
//! an attempt boundary. Agent failures are absorbed here into a failed
//! [`TaskResult`]; only internal invariant violations propagate as errors.

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::agents::{Coder, TestRun, Tester};
use crate::core::cancel::CancelFlag;
use crate::core::outcome::{StopReason, TaskResult};
use crate::core::revision::RevisionLog;
use crate::core::trace::ThoughtLog;
use crate::core::types::{CodeFile, GeneratedCode, Task, TaskStatus};

/// Synthetic failure name used when an execution reports no tests at all.
pub const NO_TESTS_EXECUTED: &str = "no-tests-executed";

/// Drive one task to a terminal status.
///
/// The task's status is advanced in place; the returned result carries the
/// final snapshot. `codebase` is the baseline this task executes against and
/// is never mutated.
pub fn run_task<C: Coder, T: Tester>(
    coder: &C,
    tester: &T,
    task: &mut Task,
    codebase: &[CodeFile],
    max_attempts: u32,
    cancel: &CancelFlag,
    thoughts: &mut ThoughtLog,
) -> Result<TaskResult> {
    if max_attempts == 0 {
        return Err(anyhow!("max_attempts must be at least 1"));
    }
    task.advance(TaskStatus::InProgress).map_err(|e| anyhow!(e))?;
    info!(task = %task.id, "task started");

    let mut log = RevisionLog::new(&task.id);
    match coder.generate(task, codebase) {
        Ok(code) => {
            thoughts.reflect(format!(
                "task '{}': generated initial change set touching {} file(s)",
                task.id,
                code.modified_files.len()
            ));
            log.push(code).map_err(|e| anyhow!(e))?;
        }
        Err(err) => {
            warn!(task = %task.id, error = %format!("{err:#}"), "generation failed");
            thoughts.reflect(format!("task '{}': initial generation failed: {err:#}", task.id));
            return finish(task, None, TestRun::default(), 1, StopReason::AgentFailure, thoughts);
        }
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let current = log.latest().cloned().ok_or_else(|| anyhow!("empty revision log"))?;

        let test_code = match tester.ensure_tests(&current, codebase) {
            Ok(code) => code,
            Err(err) => {
                thoughts.reflect(format!(
                    "task '{}': test synthesis failed on attempt {attempt}: {err:#}",
                    task.id
                ));
                return finish(
                    task,
                    Some(current),
                    TestRun::default(),
                    attempt,
                    StopReason::AgentFailure,
                    thoughts,
                );
            }
        };

        let mut run = match tester.run(&current, &test_code, codebase) {
            Ok(run) => run,
            Err(err) => {
                thoughts.reflect(format!(
                    "task '{}': test execution failed on attempt {attempt}: {err:#}",
                    task.id
                ));
                return finish(
                    task,
                    Some(current),
                    TestRun::default(),
                    attempt,
                    StopReason::AgentFailure,
                    thoughts,
                );
            }
        };

        // An execution that reports nothing proves nothing. Treat it as a
        // failure so the loop revises instead of declaring victory.
        if run.passed.is_empty() && run.failed.is_empty() {
            thoughts.reflect(format!(
                "task '{}': attempt {attempt} executed no tests, treating as failure",
                task.id
            ));
            run.failed
                .push(crate::core::types::TestResult::failed(
                    NO_TESTS_EXECUTED,
                    "test execution reported no results",
                ));
        }

        if run.failed.is_empty() {
            thoughts.reflect(format!(
                "task '{}': attempt {attempt} passed all {} test(s), converged",
                task.id,
                run.passed.len()
            ));
            return finish(task, Some(current), run, attempt, StopReason::Converged, thoughts);
        }

        thoughts.reflect(format!(
            "task '{}': attempt {attempt} failed {} of {} test(s)",
            task.id,
            run.failed.len(),
            run.passed.len() + run.failed.len()
        ));

        if attempt == max_attempts {
            thoughts.reflect(format!(
                "task '{}': attempt budget of {max_attempts} exhausted",
                task.id
            ));
            return finish(
                task,
                Some(current),
                run,
                attempt,
                StopReason::AttemptsExhausted,
                thoughts,
            );
        }

        if cancel.is_cancelled() {
            thoughts.reflect(format!(
                "task '{}': cancellation requested, stopping after attempt {attempt}",
                task.id
            ));
            return finish(task, Some(current), run, attempt, StopReason::Cancelled, thoughts);
        }

        match coder.revise(&current, &run.failed, task) {
            Ok(revised) => {
                thoughts.reflect(format!(
                    "task '{}': revised change set for attempt {}",
                    task.id,
                    attempt + 1
                ));
                log.push(revised).map_err(|e| anyhow!(e))?;
            }
            Err(err) => {
                warn!(task = %task.id, error = %format!("{err:#}"), "revision failed");
                thoughts.reflect(format!(
                    "task '{}': revision failed after attempt {attempt}: {err:#}",
                    task.id
                ));
                return finish(
                    task,
                    Some(current),
                    run,
                    attempt,
                    StopReason::AgentFailure,
                    thoughts,
                );
            }
        }
    }
}

fn finish(
    task: &mut Task,
    final_code: Option<GeneratedCode>,
    run: TestRun,
    attempts: u32,
    stop_reason: StopReason,
    thoughts: &mut ThoughtLog,
) -> Result<TaskResult> {
    let converged = stop_reason == StopReason::Converged;
    let next = if converged {
        TaskStatus::Succeeded
    } else {
        TaskStatus::Failed
    };
    task.advance(next).map_err(|e| anyhow!(e))?;
    info!(
        task = %task.id,
        attempts,
        converged,
        stop_reason = ?stop_reason,
        "task finished"
    );
    if !converged {
        thoughts.reflect(format!("task '{}': marked failed ({stop_reason:?})", task.id));
    }
    Ok(TaskResult {
        task: task.clone(),
        final_code,
        passed_tests: run.passed,
        failed_tests: run.failed,
        attempts,
        converged,
        stop_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TestResult;
    use crate::error::{GenerationError, ModelError};
    use crate::test_support::{ScriptedCoder, ScriptedTester, generated, task};

    fn passing_run(names: &[&str]) -> TestRun {
        TestRun {
            passed: names.iter().map(|n| TestResult::passed(*n)).collect(),
            failed: Vec::new(),
        }
    }

    fn failing_run(failed: &[(&str, &str)]) -> TestRun {
        TestRun {
            passed: vec![TestResult::passed("test_ok")],
            failed: failed
                .iter()
                .map(|(n, d)| TestResult::failed(*n, *d))
                .collect(),
        }
    }

    #[test]
    fn converges_on_first_attempt() {
        let coder = ScriptedCoder::new(vec![Ok(generated("t1", &[("a.py", "v1")]))], Vec::new());
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string())],
            vec![Ok(passing_run(&["test_a"]))],
        );
        let mut t = task("t1");
        let mut thoughts = ThoughtLog::new();

        let result = run_task(
            &coder,
            &tester,
            &mut t,
            &[],
            3,
            &CancelFlag::new(),
            &mut thoughts,
        )
        .expect("run");

        assert!(result.converged);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.stop_reason, StopReason::Converged);
        assert_eq!(t.status, TaskStatus::Succeeded);
        assert_eq!(
            result.final_code.expect("code").modified_files.get("a.py"),
            Some("v1")
        );
    }

    #[test]
    fn revises_until_convergence() {
        let coder = ScriptedCoder::new(
            vec![Ok(generated("t1", &[("a.py", "v1")]))],
            vec![Ok(generated("t1", &[("a.py", "v2")]))],
        );
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string()), Ok("tests".to_string())],
            vec![
                Ok(failing_run(&[("test_edge", "boom")])),
                Ok(passing_run(&["test_ok", "test_edge"])),
            ],
        );
        let mut t = task("t1");
        let mut thoughts = ThoughtLog::new();

        let result = run_task(
            &coder,
            &tester,
            &mut t,
            &[],
            3,
            &CancelFlag::new(),
            &mut thoughts,
        )
        .expect("run");

        assert!(result.converged);
        assert_eq!(result.attempts, 2);
        assert_eq!(
            result.final_code.expect("code").modified_files.get("a.py"),
            Some("v2")
        );
        assert!(thoughts
            .entries()
            .iter()
            .any(|e| e.contains("attempt 1 failed 1 of 2")));
    }

    #[test]
    fn attempt_budget_bounds_the_loop() {
        let coder = ScriptedCoder::new(
            vec![Ok(generated("t1", &[("a.py", "v1")]))],
            vec![
                Ok(generated("t1", &[("a.py", "v2")])),
                Ok(generated("t1", &[("a.py", "v3")])),
            ],
        );
        let tester = ScriptedTester::new(
            vec![
                Ok("tests".to_string()),
                Ok("tests".to_string()),
                Ok("tests".to_string()),
            ],
            vec![
                Ok(failing_run(&[("test_x", "still broken")])),
                Ok(failing_run(&[("test_x", "still broken")])),
                Ok(failing_run(&[("test_x", "still broken")])),
            ],
        );
        let mut t = task("t1");
        let mut thoughts = ThoughtLog::new();

        let result = run_task(
            &coder,
            &tester,
            &mut t,
            &[],
            3,
            &CancelFlag::new(),
            &mut thoughts,
        )
        .expect("run");

        assert!(!result.converged);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.stop_reason, StopReason::AttemptsExhausted);
        assert_eq!(t.status, TaskStatus::Failed);
        // The last attempt's change set is still reported.
        assert_eq!(
            result.final_code.expect("code").modified_files.get("a.py"),
            Some("v3")
        );
        assert_eq!(result.failed_tests[0].name, "test_x");
    }

    #[test]
    fn generation_failure_fails_the_task_without_testing() {
        let coder = ScriptedCoder::new(
            vec![Err(GenerationError::new("no JSON object").into())],
            Vec::new(),
        );
        let tester = ScriptedTester::new(Vec::new(), Vec::new());
        let mut t = task("t1");
        let mut thoughts = ThoughtLog::new();

        let result = run_task(
            &coder,
            &tester,
            &mut t,
            &[],
            3,
            &CancelFlag::new(),
            &mut thoughts,
        )
        .expect("run");

        assert!(!result.converged);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.stop_reason, StopReason::AgentFailure);
        assert!(result.final_code.is_none());
        assert_eq!(tester.run_calls(), 0);
    }

    #[test]
    fn revision_failure_keeps_previous_attempt_as_final_code() {
        let coder = ScriptedCoder::new(
            vec![Ok(generated("t1", &[("a.py", "v1")]))],
            vec![Err(ModelError::new("quota exceeded").into())],
        );
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string())],
            vec![Ok(failing_run(&[("test_x", "boom")]))],
        );
        let mut t = task("t1");
        let mut thoughts = ThoughtLog::new();

        let result = run_task(
            &coder,
            &tester,
            &mut t,
            &[],
            3,
            &CancelFlag::new(),
            &mut thoughts,
        )
        .expect("run");

        assert!(!result.converged);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.stop_reason, StopReason::AgentFailure);
        assert_eq!(
            result.final_code.expect("code").modified_files.get("a.py"),
            Some("v1")
        );
    }

    #[test]
    fn no_tests_executed_is_not_convergence() {
        let coder = ScriptedCoder::new(
            vec![Ok(generated("t1", &[("a.py", "v1")]))],
            vec![Ok(generated("t1", &[("a.py", "v2")]))],
        );
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string()), Ok("tests".to_string())],
            vec![Ok(TestRun::default()), Ok(passing_run(&["test_a"]))],
        );
        let mut t = task("t1");
        let mut thoughts = ThoughtLog::new();

        let result = run_task(
            &coder,
            &tester,
            &mut t,
            &[],
            3,
            &CancelFlag::new(),
            &mut thoughts,
        )
        .expect("run");

        // The empty execution counted as a failed attempt, then revision won.
        assert!(result.converged);
        assert_eq!(result.attempts, 2);
        assert!(thoughts
            .entries()
            .iter()
            .any(|e| e.contains("executed no tests")));
    }

    #[test]
    fn cancellation_stops_at_the_attempt_boundary() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let coder = ScriptedCoder::new(
            vec![Ok(generated("t1", &[("a.py", "v1")]))],
            Vec::new(),
        );
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string())],
            vec![Ok(failing_run(&[("test_x", "boom")]))],
        );
        let mut t = task("t1");
        let mut thoughts = ThoughtLog::new();

        let result = run_task(&coder, &tester, &mut t, &[], 3, &cancel, &mut thoughts)
            .expect("run");

        // The in-flight attempt completed; no revision was requested.
        assert!(!result.converged);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert_eq!(coder.revise_calls(), 0);
    }
}

//! Sequential project execution: each task runs its own loop against the
//! codebase as updated by its predecessors, and the per-task change sets are
//! merged into one project-level file map.
//!
//! A failed task does not stop the run; later tasks still execute and the
//! failed task's last attempt still contributes to the merged map, so the
//! caller sees exactly what the pipeline would have written. Merge conflicts
//! resolve last-writer-wins with an explicit audit note per overridden path.

use anyhow::Result;
use tracing::info;

use crate::agents::{Coder, Tester};
use crate::core::cancel::CancelFlag;
use crate::core::files::{FileMap, apply_changes};
use crate::core::outcome::ProjectResult;
use crate::core::trace::ThoughtLog;
use crate::core::types::{CodeFile, Project};
use crate::task_loop::run_task;

/// Execute every task of `project` in order against `codebase`.
///
/// Cancellation is honored at task boundaries: tasks not yet started stay
/// `Pending` and produce no result entry.
pub fn run_project<C: Coder, T: Tester>(
    coder: &C,
    tester: &T,
    mut project: Project,
    codebase: &[CodeFile],
    max_attempts_per_task: u32,
    cancel: &CancelFlag,
) -> Result<ProjectResult> {
    let mut thoughts = ThoughtLog::new();
    thoughts.reflect(format!(
        "project '{}': executing {} task(s) for request: {}",
        project.id,
        project.tasks.len(),
        project.source_query
    ));
    info!(project = %project.id, tasks = project.tasks.len(), "project started");

    let mut working: Vec<CodeFile> = codebase.to_vec();
    let mut merged = FileMap::new();
    let mut task_results = Vec::new();

    for task in &mut project.tasks {
        if cancel.is_cancelled() {
            thoughts.reflect(format!(
                "project cancelled before task '{}'; remaining tasks skipped",
                task.id
            ));
            break;
        }

        let result = run_task(
            coder,
            tester,
            task,
            &working,
            max_attempts_per_task,
            cancel,
            &mut thoughts,
        )?;

        if let Some(code) = &result.final_code {
            for path in merged.merge_from(&code.modified_files) {
                thoughts.reflect(format!(
                    "merge conflict: task '{}' overrides earlier edit of '{path}'",
                    task.id
                ));
            }
            working = apply_changes(&working, &code.modified_files);
        }
        task_results.push(result);
    }

    let converged = task_results.iter().filter(|r| r.converged).count();
    thoughts.reflect(format!(
        "project '{}': {converged} of {} executed task(s) converged",
        project.id,
        task_results.len()
    ));
    info!(
        project = %project.id,
        executed = task_results.len(),
        converged,
        "project finished"
    );

    Ok(ProjectResult {
        project,
        task_results,
        modified_files: merged,
        thought_process: thoughts.into_entries(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::TestRun;
    use crate::core::types::{TaskStatus, TestResult};
    use crate::error::GenerationError;
    use crate::test_support::{ScriptedCoder, ScriptedTester, code_file, generated, task};

    fn pass() -> Result<TestRun> {
        Ok(TestRun {
            passed: vec![TestResult::passed("test_ok")],
            failed: Vec::new(),
        })
    }

    fn project_of(ids: &[&str]) -> Project {
        Project::new("p1", "query", ids.iter().map(|id| task(id)).collect()).expect("project")
    }

    #[test]
    fn later_tasks_see_earlier_tasks_output() {
        let coder = ScriptedCoder::new(
            vec![
                Ok(generated("t1", &[("a.py", "from t1")])),
                Ok(generated("t2", &[("b.py", "from t2")])),
            ],
            Vec::new(),
        );
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string()), Ok("tests".to_string())],
            vec![pass(), pass()],
        );

        let result = run_project(
            &coder,
            &tester,
            project_of(&["t1", "t2"]),
            &[code_file("a.py", "baseline")],
            3,
            &CancelFlag::new(),
        )
        .expect("run");

        // The second task's loop executed against a codebase already carrying
        // the first task's edit.
        let second_baseline = tester.run_codebase(1);
        assert!(second_baseline
            .iter()
            .any(|f| f.path == "a.py" && f.content == "from t1"));

        assert_eq!(result.task_results.len(), 2);
        assert_eq!(result.modified_files.get("a.py"), Some("from t1"));
        assert_eq!(result.modified_files.get("b.py"), Some("from t2"));
    }

    #[test]
    fn failed_task_does_not_stop_the_run() {
        let coder = ScriptedCoder::new(
            vec![
                Ok(generated("t1", &[("a.py", "from t1")])),
                Err(GenerationError::new("unparsable").into()),
                Ok(generated("t3", &[("c.py", "from t3")])),
            ],
            Vec::new(),
        );
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string()), Ok("tests".to_string())],
            vec![pass(), pass()],
        );

        let result = run_project(
            &coder,
            &tester,
            project_of(&["t1", "t2", "t3"]),
            &[],
            3,
            &CancelFlag::new(),
        )
        .expect("run");

        assert_eq!(result.task_results.len(), 3);
        assert!(result.task_results[0].converged);
        assert!(!result.task_results[1].converged);
        assert!(result.task_results[2].converged);
        assert_eq!(result.modified_files.get("a.py"), Some("from t1"));
        assert_eq!(result.modified_files.get("c.py"), Some("from t3"));
    }

    #[test]
    fn merge_conflict_gets_an_audit_note() {
        let coder = ScriptedCoder::new(
            vec![
                Ok(generated("t1", &[("a.py", "from t1")])),
                Ok(generated("t2", &[("a.py", "from t2")])),
            ],
            Vec::new(),
        );
        let tester = ScriptedTester::new(
            vec![Ok("tests".to_string()), Ok("tests".to_string())],
            vec![pass(), pass()],
        );

        let result = run_project(
            &coder,
            &tester,
            project_of(&["t1", "t2"]),
            &[],
            3,
            &CancelFlag::new(),
        )
        .expect("run");

        assert_eq!(result.modified_files.get("a.py"), Some("from t2"));
        assert!(result.thought_process.iter().any(|t| {
            t.contains("merge conflict: task 't2' overrides earlier edit of 'a.py'")
        }));
    }

    #[test]
    fn cancellation_skips_unstarted_tasks() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let coder = ScriptedCoder::new(Vec::new(), Vec::new());
        let tester = ScriptedTester::new(Vec::new(), Vec::new());

        let result = run_project(
            &coder,
            &tester,
            project_of(&["t1", "t2"]),
            &[],
            3,
            &cancel,
        )
        .expect("run");

        assert!(result.task_results.is_empty());
        assert!(result
            .project
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::Pending));
        assert!(result
            .thought_process
            .iter()
            .any(|t| t.contains("cancelled before task 't1'")));
    }

    #[test]
    fn unchanged_files_complement_the_merged_map() {
        let coder = ScriptedCoder::new(
            vec![Ok(generated("t1", &[("a.py", "new")]))],
            Vec::new(),
        );
        let tester =
            ScriptedTester::new(vec![Ok("tests".to_string())], vec![pass()]);
        let codebase = vec![code_file("a.py", "old"), code_file("b.py", "same")];

        let result = run_project(
            &coder,
            &tester,
            project_of(&["t1"]),
            &codebase,
            3,
            &CancelFlag::new(),
        )
        .expect("run");

        let unchanged = result.unchanged_files(&codebase);
        assert_eq!(unchanged.len(), 1);
        assert_eq!(unchanged[0].path, "b.py");
    }
}

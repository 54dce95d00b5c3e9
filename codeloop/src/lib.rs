//! Iterative multi-agent code-change pipeline.
//!
//! A change request is decomposed into tasks by a planner, each task is driven
//! through a generate/test/revise loop, and the per-task change sets are
//! merged into one project-level result. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic data structures and invariants (task
//!   lifecycle, file maps, revision chains, outcomes). No I/O, fully testable
//!   in isolation.
//! - **[`io`]**: Side-effecting operations (model subprocess, sandboxed test
//!   execution, config, workspace filesystem). Isolated behind traits to
//!   enable scripted doubles in tests.
//! - **[`agents`]**: The planner/coder/tester capability interfaces and the
//!   model-backed implementations.
//!
//! Orchestration modules ([`task_loop`], [`project`], [`orchestrator`])
//! coordinate agents with core state to implement the pipeline.

pub mod agents;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod project;
pub mod task_loop;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

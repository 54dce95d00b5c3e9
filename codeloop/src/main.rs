//! Multi-agent code-change pipeline CLI.
//!
//! Takes a natural-language change request, plans it into tasks, drives each
//! task through a generate/test/revise loop, and writes the merged change set
//! to an output directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use codeloop::agents::{CoderAgent, Planner, PlannerAgent, TesterAgent};
use codeloop::core::outcome::{FinalResult, StopReason};
use codeloop::exit_codes;
use codeloop::io::config::{PipelineConfig, load_config, write_config};
use codeloop::io::llm::CommandModel;
use codeloop::io::prompt::PromptBuilder;
use codeloop::io::sandbox::ProcessSandbox;
use codeloop::io::workspace::{load_codebase, store_files};
use codeloop::logging;
use codeloop::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(
    name = "codeloop",
    version,
    about = "Iterative multi-agent code-change pipeline"
)]
struct Cli {
    /// Path to the pipeline config file.
    #[arg(long, global = true, default_value = "codeloop.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Plan a change request into tasks without executing them.
    Plan {
        /// The change request.
        query: String,
        /// Directory holding the codebase to plan against.
        #[arg(long, default_value = ".")]
        codebase: PathBuf,
    },
    /// Plan and execute a change request, writing the merged changes out.
    Run {
        /// The change request.
        query: String,
        /// Directory holding the codebase to modify.
        #[arg(long, default_value = ".")]
        codebase: PathBuf,
        /// Directory the merged change set is written to. Defaults to the
        /// codebase directory.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Override the configured per-task attempt budget.
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Override the configured task limit.
        #[arg(long)]
        max_tasks: Option<usize>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Plan { query, codebase } => cmd_plan(&cli.config, &query, &codebase),
        Command::Run {
            query,
            codebase,
            out,
            max_attempts,
            max_tasks,
        } => cmd_run(&cli.config, &query, &codebase, out, max_attempts, max_tasks),
    }
}

fn cmd_init(config_path: &PathBuf, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        println!("config already exists: {}", config_path.display());
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &PipelineConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_plan(config_path: &PathBuf, query: &str, codebase_dir: &PathBuf) -> Result<i32> {
    let config = load_config(config_path)?;
    let codebase = load_codebase(codebase_dir)
        .with_context(|| format!("load codebase from {}", codebase_dir.display()))?;

    let model = CommandModel::new(
        config.model.command.clone(),
        config.model.timeout(),
        config.model.output_limit_bytes,
    )?;
    let prompts = PromptBuilder::new(config.prompt_budget_bytes);
    let planner = PlannerAgent::new(&model, prompts);

    let project = planner.create_plan(query, &codebase, config.max_tasks)?;
    for task in &project.tasks {
        let kind = serde_json::to_value(task.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("{} [{}] {}", task.id, kind, task.description);
    }
    Ok(exit_codes::OK)
}

fn cmd_run(
    config_path: &PathBuf,
    query: &str,
    codebase_dir: &PathBuf,
    out: Option<PathBuf>,
    max_attempts: Option<u32>,
    max_tasks: Option<usize>,
) -> Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(n) = max_attempts {
        config.max_attempts_per_task = n;
    }
    if let Some(n) = max_tasks {
        config.max_tasks = n;
    }

    let codebase = load_codebase(codebase_dir)
        .with_context(|| format!("load codebase from {}", codebase_dir.display()))?;

    let model = CommandModel::new(
        config.model.command.clone(),
        config.model.timeout(),
        config.model.output_limit_bytes,
    )?;
    let sandbox = ProcessSandbox::new(
        config.sandbox.command.clone(),
        config.sandbox.test_file_name.clone(),
        config.sandbox.timeout(),
        config.sandbox.output_limit_bytes,
    )?;
    let prompts = PromptBuilder::new(config.prompt_budget_bytes);

    let planner = PlannerAgent::new(&model, prompts.clone());
    let coder = CoderAgent::new(&model, prompts.clone(), config.style_guide.clone());
    let tester = TesterAgent::new(&model, &sandbox, prompts, config.test_framework.clone());

    let orchestrator = Orchestrator::new(planner, coder, tester, config)?;
    let result = orchestrator.run(query, &codebase)?;

    let out_dir = out.unwrap_or_else(|| codebase_dir.clone());
    store_files(&out_dir, &result.project_result.modified_files)
        .with_context(|| format!("write changes to {}", out_dir.display()))?;

    print_summary(&result);
    if result.overall_success {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::INCOMPLETE)
    }
}

fn print_summary(result: &FinalResult) {
    for task_result in &result.project_result.task_results {
        let line = match task_result.stop_reason {
            StopReason::Converged => format!(
                "task {}: converged in {} attempt(s), {} test(s) passed",
                task_result.task.id,
                task_result.attempts,
                task_result.passed_tests.len()
            ),
            StopReason::AttemptsExhausted => format!(
                "task {}: failed, attempt budget exhausted after {} attempt(s)",
                task_result.task.id, task_result.attempts
            ),
            StopReason::AgentFailure => {
                format!("task {}: failed, agent error", task_result.task.id)
            }
            StopReason::Cancelled => {
                format!("task {}: cancelled", task_result.task.id)
            }
        };
        println!("{line}");
    }
    let executed = result.project_result.task_results.len();
    let planned = result.project_result.project.tasks.len();
    if executed < planned {
        println!("{} of {planned} task(s) not executed", planned - executed);
    }
    println!(
        "modified {} file(s); overall: {}",
        result.project_result.modified_files.len(),
        if result.overall_success {
            "success"
        } else {
            "incomplete"
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "codeloop",
            "run",
            "add validation",
            "--codebase",
            "src",
            "--max-attempts",
            "5",
        ]);
        match cli.command {
            Command::Run {
                query,
                codebase,
                max_attempts,
                ..
            } => {
                assert_eq!(query, "add validation");
                assert_eq!(codebase, PathBuf::from("src"));
                assert_eq!(max_attempts, Some(5));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["codeloop", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["codeloop", "plan", "q", "--config", "alt.toml"]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }
}

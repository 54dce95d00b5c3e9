//! Side-effecting adapters: model backend, test sandbox, config, prompts,
//! workspace files. Isolated from `core` to enable mocking in tests.

pub mod config;
pub mod llm;
pub mod process;
pub mod prompt;
pub mod sandbox;
pub mod workspace;

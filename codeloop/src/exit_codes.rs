//! Stable exit codes for codeloop CLI commands.

/// Command succeeded and every task converged.
pub const OK: i32 = 0;
/// Command failed due to invalid config/arguments or a fatal pipeline error.
pub const INVALID: i32 = 1;
/// The run finished but at least one task did not converge.
pub const INCOMPLETE: i32 = 2;

//! Pure, deterministic pipeline logic: data model, file maps, revision
//! chains, result aggregation. No I/O.

pub mod cancel;
pub mod files;
pub mod outcome;
pub mod revision;
pub mod trace;
pub mod types;

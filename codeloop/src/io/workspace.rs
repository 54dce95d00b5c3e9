//! Load a codebase snapshot from disk and store merged results.
//!
//! The orchestration core itself never touches the filesystem; these helpers
//! exist for the CLI, which needs a snapshot to feed in and a place to write
//! the merged file map out.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::core::files::FileMap;
use crate::core::types::CodeFile;

/// Read every UTF-8 file under `root` into a codebase snapshot.
///
/// Hidden entries (dot-prefixed, e.g. `.git`) are skipped; non-UTF-8 files
/// are skipped with a warning. Paths are relative to `root`, `/`-separated,
/// sorted for determinism.
pub fn load_codebase(root: &Path) -> Result<Vec<CodeFile>> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<CodeFile>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read dir entry in {}", dir.display()))?;
        let path = entry.path();
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect_files(root, &path, files)?;
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => {
                let rel = relative_path(root, &path)?;
                files.push(CodeFile::new(rel, content));
            }
            Err(err) => {
                warn!(path = %path.display(), err = %err, "skipping unreadable file");
            }
        }
    }
    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel: PathBuf = path
        .strip_prefix(root)
        .with_context(|| format!("strip prefix from {}", path.display()))?
        .to_path_buf();
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Write every file in the map under `dir`, creating parent directories.
pub fn store_files(dir: &Path, files: &FileMap) -> Result<()> {
    for file in files.iter() {
        let full = dir.join(&file.path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&full, &file.content).with_context(|| format!("write {}", full.display()))?;
    }
    Ok(())
}

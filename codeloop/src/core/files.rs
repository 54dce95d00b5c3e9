//! Ordered path-to-content mapping with path uniqueness as an invariant.
//!
//! Iteration order is insertion order, which keeps merged output and audit
//! notes stable across runs.

use serde::{Deserialize, Serialize};

use crate::core::types::CodeFile;

/// Ordered mapping from file path to content. Paths are unique; inserting an
/// existing path replaces its content in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CodeFile>", into = "Vec<CodeFile>")]
pub struct FileMap {
    entries: Vec<CodeFile>,
}

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of files, rejecting duplicate paths.
    pub fn from_files(files: Vec<CodeFile>) -> Result<Self, String> {
        let mut map = Self::new();
        for file in files {
            if map.contains(&file.path) {
                return Err(format!("duplicate path '{}' in file map", file.path));
            }
            map.entries.push(file);
        }
        Ok(map)
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        if let Some(existing) = self.entries.iter_mut().find(|f| f.path == path) {
            existing.content = content;
            return;
        }
        self.entries.push(CodeFile { path, content });
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.content.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|f| f.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeFile> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|f| f.path.as_str())
    }

    /// Whether every path in `other` is also present here.
    pub fn covers(&self, other: &FileMap) -> bool {
        other.paths().all(|p| self.contains(p))
    }

    /// Merge `other` into `self`, later writer winning per path.
    ///
    /// Returns the paths that were overridden, in `other`'s order, so the
    /// caller can record an explicit conflict note instead of silently
    /// dropping the signal.
    pub fn merge_from(&mut self, other: &FileMap) -> Vec<String> {
        let mut overridden = Vec::new();
        for file in other.iter() {
            if self.contains(&file.path) {
                overridden.push(file.path.clone());
            }
            self.insert(file.path.clone(), file.content.clone());
        }
        overridden
    }

    pub fn into_files(self) -> Vec<CodeFile> {
        self.entries
    }
}

impl TryFrom<Vec<CodeFile>> for FileMap {
    type Error = String;

    fn try_from(files: Vec<CodeFile>) -> Result<Self, Self::Error> {
        Self::from_files(files)
    }
}

impl From<FileMap> for Vec<CodeFile> {
    fn from(map: FileMap) -> Self {
        map.entries
    }
}

/// Apply a change set to a codebase snapshot, returning a new snapshot.
///
/// Existing files are replaced in place; new files are appended in the change
/// set's order. The input snapshot is never mutated.
pub fn apply_changes(codebase: &[CodeFile], changes: &FileMap) -> Vec<CodeFile> {
    let mut updated: Vec<CodeFile> = codebase.to_vec();
    for change in changes.iter() {
        match updated.iter_mut().find(|f| f.path == change.path) {
            Some(existing) => existing.content = change.content.clone(),
            None => updated.push(change.clone()),
        }
    }
    updated
}

//! In-process dataset store.

use super::{DatasetStore, StoreError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// A commit recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub path: String,
    pub message: String,
    pub size: usize,
}

/// Dataset store backed by a map. Records every commit so tests can count uploads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    commits: Mutex<Vec<Commit>>,
    fail_prefix: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds empty objects at `paths`.
    pub fn with_files<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let objects = paths.into_iter().map(|p| (p.into(), Vec::new())).collect();
        Self {
            objects: Mutex::new(objects),
            ..Self::default()
        }
    }

    /// Reject uploads whose path starts with `prefix`.
    pub fn failing_uploads(mut self, prefix: impl Into<String>) -> Self {
        self.fail_prefix = Some(prefix.into());
        self
    }

    pub fn commits(&self) -> Vec<Commit> {
        self.commits.lock().unwrap().clone()
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }
}

impl DatasetStore for MemoryStore {
    fn list_files(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }

    fn upload_file(
        &self,
        local_path: &Path,
        path_in_repo: &str,
        commit_message: &str,
    ) -> Result<(), StoreError> {
        if let Some(prefix) = &self.fail_prefix {
            if path_in_repo.starts_with(prefix.as_str()) {
                return Err(StoreError::Transport(format!(
                    "connection reset while uploading {path_in_repo}"
                )));
            }
        }

        let content = std::fs::read(local_path)
            .map_err(|e| StoreError::Io(format!("read {}: {e}", local_path.display())))?;

        self.commits.lock().unwrap().push(Commit {
            path: path_in_repo.to_string(),
            message: commit_message.to_string(),
            size: content.len(),
        });
        self.objects
            .lock()
            .unwrap()
            .insert(path_in_repo.to_string(), content);
        Ok(())
    }
}

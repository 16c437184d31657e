//! Remote dataset store.
//!
//! The `DatasetStore` trait is the seam between the pipeline and the dataset
//! repository. `HubStore` talks to the Hugging Face Hub; `MemoryStore` keeps objects
//! in process for tests and dry runs.

pub mod hub;
pub mod memory;

pub use hub::HubStore;
pub use memory::MemoryStore;

use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("local file error: {0}")]
    Io(String),
}

/// A remote object store scoped to one dataset repository.
pub trait DatasetStore {
    /// All object paths currently in the repository.
    fn list_files(&self) -> Result<Vec<String>, StoreError>;

    /// Upload a local file to `path_in_repo` as a single commit.
    fn upload_file(
        &self,
        local_path: &Path,
        path_in_repo: &str,
        commit_message: &str,
    ) -> Result<(), StoreError>;
}

/// Snapshot of object paths present in the store when the run started.
///
/// Read once and passed by shared reference; it does not observe uploads made during
/// the same run.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    paths: BTreeSet<String>,
}

impl RemoteIndex {
    /// List the store once and freeze the result.
    pub fn snapshot(store: &dyn DatasetStore) -> Result<Self, StoreError> {
        let index = Self::from_paths(store.list_files()?);
        tracing::info!(objects = index.len(), "fetched remote index");
        Ok(index)
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

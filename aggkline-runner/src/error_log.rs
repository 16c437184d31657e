//! Append-only failure log.
//!
//! Each failure is two lines: the URL, then `Error: <message>`. The file is opened in
//! append mode per entry, so entries from earlier runs are kept and a crash loses at
//! most the entry being written.

use aggkline_core::EtlError;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, url: &str, err: &EtlError) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(file, "{url}\nError: {err}\n")
    }
}

//! Per-request scratch space
//!
//! Every temporary artifact of a pipeline run (the downloaded document, staged
//! page images) lives under one directory that is removed when the workspace
//! is dropped: on success, on error, and when the request future is cancelled.

use std::io;
use std::path::Path;

use tempfile::TempDir;

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>, request_id: &str) -> io::Result<Self> {
        let prefix = format!("pdf-ocr-{}-", request_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

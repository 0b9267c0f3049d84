// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Temporary print artifacts.
//
// Every artifact is a uniquely named file owned by exactly one dispatch.  The
// file is removed by `Artifact::dispose` once the print utility has run, or by
// `Drop` if the owning task never gets that far.

use std::io::Write;
use std::path::{Path, PathBuf};

use druckbote_core::error::{DruckboteError, Result};
use tempfile::TempPath;
use tracing::{debug, instrument, warn};

const ARTIFACT_PREFIX: &str = "druckbote-";
const ARTIFACT_SUFFIX: &str = ".pdf";

/// Creates temporary print-ready files in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store artifacts in `dir`, which must exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store artifacts in the system temporary directory.
    pub fn system_temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to a fresh, uniquely named file.
    #[instrument(skip_all, fields(bytes = bytes.len(), dir = %self.dir.display()))]
    pub async fn create(&self, bytes: Vec<u8>) -> Result<Artifact> {
        let dir = self.dir.clone();
        let len = bytes.len();

        let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            let mut file = tempfile::Builder::new()
                .prefix(ARTIFACT_PREFIX)
                .suffix(ARTIFACT_SUFFIX)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| DruckboteError::Write(std::io::Error::other(e)))?
        .map_err(DruckboteError::Write)?;

        debug!(path = %path.display(), "artifact created");
        Ok(Artifact { path, len })
    }
}

/// A print-ready file on disk.  Removed when disposed or dropped.
#[derive(Debug)]
pub struct Artifact {
    path: TempPath,
    len: usize,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the document in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove the file.  Never fails: problems are logged and swallowed so
    /// that they cannot mask the outcome of the dispatch that used it.
    pub async fn dispose(self) {
        let shown = self.path.display().to_string();
        let path = self.path;

        match tokio::task::spawn_blocking(move || path.close()).await {
            Ok(Ok(())) => debug!(path = %shown, "artifact removed"),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %shown, "artifact already gone");
            }
            Ok(Err(e)) => warn!(path = %shown, error = %e, "failed to remove artifact"),
            Err(e) => warn!(path = %shown, error = %e, "artifact removal task failed"),
        }
    }
}

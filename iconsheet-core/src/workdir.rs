//! Working Directory - Transient Staging Area
//!
//! Owned by exactly one pipeline run. Any stale directory with the same
//! name is destroyed before the run starts populating it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("Working directory {path}: {source}")]
pub struct WorkDirError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Resolve the working directory path for a run.
    ///
    /// With `unique`, a random suffix is appended to `name`.
    pub fn resolve_path(root: Option<&Path>, name: &str, unique: bool) -> PathBuf {
        let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        if unique {
            root.join(format!("{}-{}", name, Uuid::new_v4().simple()))
        } else {
            root.join(name)
        }
    }

    /// Destroy whatever sits at `path` and create an empty directory.
    pub fn create_fresh(path: impl Into<PathBuf>) -> Result<Self, WorkDirError> {
        let path = path.into();
        let wrap = |source| WorkDirError {
            path: path.clone(),
            source,
        };

        if path.is_dir() {
            debug!(path = %path.display(), "Removing stale working directory");
            fs::remove_dir_all(&path).map_err(wrap)?;
        } else if path.exists() {
            fs::remove_file(&path).map_err(wrap)?;
        }
        fs::create_dir_all(&path).map_err(wrap)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory and everything in it.
    pub fn remove(self) -> Result<(), WorkDirError> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkDirError {
                path: self.path,
                source,
            }),
        }
    }
}

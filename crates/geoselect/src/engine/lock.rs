//! Process-level lock on the output workspace.
//!
//! DuckDB only allows one writer process at a time, so the engine holds an
//! exclusive lock file next to the workspace database while it runs.

use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Output workspace is locked by another writer: {}", .0.display())]
    Held(PathBuf),

    #[error("Cannot open workspace lock file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot lock workspace lock file {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive claim on an output workspace, released on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    /// Lock file guarding `workspace`: its full file name plus `.lock`.
    ///
    /// - `/data/work.duckdb` -> `/data/work.duckdb.lock`
    /// - `/data/work` -> `/data/work.lock`
    pub fn path_for(workspace: &Path) -> PathBuf {
        let mut name = OsString::from(workspace.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Claim `workspace` without blocking; fails with [`LockError::Held`]
    /// while another handle holds it.
    pub fn acquire(workspace: &Path) -> Result<Self, LockError> {
        let path = Self::path_for(workspace);
        debug!("Locking output workspace via {}", path.display());

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        // fs2's trait method; std has an inherent method of the same name.
        FileExt::try_lock_exclusive(&file).map_err(|source| {
            if source.kind() == io::ErrorKind::WouldBlock {
                LockError::Held(workspace.to_path_buf())
            } else {
                LockError::Lock {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        info!("Locked output workspace {}", workspace.display());
        Ok(Self { file, path })
    }

    pub fn lock_file(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("Unlock of {} failed: {}", self.path.display(), err);
        } else {
            debug!("Released workspace lock {}", self.path.display());
        }
    }
}

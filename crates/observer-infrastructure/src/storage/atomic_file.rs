//! Atomic file writes and advisory file locks.
//!
//! Whole-file writes go through a temporary file in the same directory,
//! fsync and rename, so readers see either the old or the new content.
//! Appends to shared files are guarded by an exclusive lock on a sibling
//! `.lock` file.

use observer_core::error::{ObserverError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes `contents` to `path` atomically.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(contents)?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| ObserverError::storage(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| ObserverError::storage(format!("{} has no file name", path.display())))?;
    Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
}

/// An exclusive lock held for as long as the guard lives.
///
/// The lock file itself is left in place; removing it while another process
/// waits on it would let two holders coexist.
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    /// Blocks until the exclusive lock for `path` is acquired.
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            fs2::FileExt::lock_exclusive(&file).map_err(|e| {
                ObserverError::storage(format!(
                    "Failed to lock {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Err(e) = fs2::FileExt::unlock(&self.file) {
                tracing::warn!(path = %self.lock_path.display(), error = %e, "Failed to release file lock");
            }
        }
    }
}

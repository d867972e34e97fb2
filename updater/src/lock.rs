//! Advisory lock serialising updater runs on one install.

use crate::error::{Result, UpdaterError};
use crate::state::LOCK_FILE;
use camino::Utf8Path;
use fs2::FileExt;
use log::debug;
use std::fs::{File, OpenOptions};

/// Exclusive lock on `<base>/.ts3updater.lock`, released on drop.
#[derive(Debug)]
pub struct UpdateLock {
    file: File,
}

impl UpdateLock {
    /// Take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::LockBusy`] when another process holds it, or
    /// an I/O error if the lock file cannot be opened.
    pub fn acquire(base_dir: &Utf8Path) -> Result<Self> {
        let path = base_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("acquired {path}");
                Ok(Self { file })
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(UpdaterError::LockBusy {
                    path: base_dir.to_owned(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well.
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("could not release update lock: {err}");
        }
    }
}

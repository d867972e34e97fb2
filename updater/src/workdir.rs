//! Scoped working directory for the downloaded archive.
//!
//! A [`WorkDir`] is removed when it goes out of scope, which covers the
//! success path and every error path that unwinds through the pipeline.
//! Signals do not unwind, so live working directories are also registered
//! with a process-wide handler that removes them on SIGINT or SIGTERM before
//! exiting.

use crate::error::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;

/// File name of the downloaded archive inside the working directory.
pub const ARCHIVE_NAME: &str = "server.tar";

/// Prefix of working directory names.
pub const WORKDIR_PREFIX: &str = ".ts3updater-";

/// Exit status used when a signal interrupts the run.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

static LIVE_WORKDIRS: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

fn live_workdirs() -> MutexGuard<'static, Vec<PathBuf>> {
    LIVE_WORKDIRS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Temporary directory holding exactly one release archive.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh working directory below `parent`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn create_in(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir_in(parent)?;
        debug!("created working directory {}", dir.path().display());
        live_workdirs().push(dir.path().to_path_buf());
        Ok(Self { dir })
    }

    /// The directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the archive is downloaded to.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.dir.path().join(ARCHIVE_NAME)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        live_workdirs().retain(|path| path != self.dir.path());
        debug!("removing working directory {}", self.dir.path().display());
    }
}

/// Remove every live working directory.
///
/// Runs from the signal handler, where destructors will not.
pub fn remove_live_workdirs() {
    for path in live_workdirs().drain(..) {
        match std::fs::remove_dir_all(&path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                warn!("could not remove {}: {err}", path.display());
            }
            _ => {}
        }
    }
}

/// Install the SIGINT/SIGTERM handler that cleans up and exits with 130.
///
/// # Errors
///
/// Returns an I/O error if a handler is already installed.
pub fn install_signal_cleanup() -> Result<()> {
    ctrlc::set_handler(|| {
        remove_live_workdirs();
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
    .map_err(|e| std::io::Error::other(e).into())
}

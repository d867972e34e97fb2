//! Placing a verified release into the install directory.
//!
//! Two shapes of run are handled. An existing install (control script in the
//! base directory) is upgraded in place, after stopping the server if its PID
//! marker says it runs. A fresh install gets a new directory named after the
//! archive's top-level directory, and a copy of the updater so later runs can
//! be started from there.

use crate::archive::ArchiveExtractor;
use crate::error::{Result, UpdaterError};
use crate::service::ServiceControl;
use crate::state::{InstallState, UpdaterManifest, mark_license_accepted, write_manifest};
use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use std::path::Path;

/// Where the release goes and what was running before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInstall {
    /// Directory the archive is extracted into.
    pub dir: Utf8PathBuf,
    /// The server was running and has been stopped.
    pub was_running: bool,
    /// The directory was created by this run.
    pub fresh: bool,
}

/// Get the install directory ready for extraction.
///
/// # Errors
///
/// Returns [`UpdaterError::ServiceControl`] if a running server cannot be
/// stopped, or [`UpdaterError::InstallPathConflict`] if a fresh install
/// directory cannot be created.
pub fn prepare_install_dir(
    base_dir: &Utf8Path,
    top_level: &str,
    state: &InstallState,
    service: &dyn ServiceControl,
    self_exe: Option<&Path>,
) -> Result<PreparedInstall> {
    if state.start_script_present {
        let was_running = state.service_running;
        if was_running {
            info!("stopping the running server");
            service.stop(base_dir.as_std_path())?;
        }
        return Ok(PreparedInstall {
            dir: base_dir.to_owned(),
            was_running,
            fresh: false,
        });
    }

    let dir = base_dir.join(top_level);
    std::fs::create_dir(&dir).map_err(|e| UpdaterError::InstallPathConflict {
        path: dir.clone(),
        reason: e.to_string(),
    })?;
    info!("created install directory {dir}");
    if let Some(exe) = self_exe {
        copy_updater(exe, &dir);
    }

    Ok(PreparedInstall {
        dir,
        was_running: false,
        fresh: true,
    })
}

/// Copy the updater next to the new install. A failure only costs the
/// convenience of running it from there, so it is logged and skipped.
fn copy_updater(exe: &Path, dir: &Utf8Path) {
    let Some(name) = exe.file_name() else {
        return;
    };
    if let Err(err) = std::fs::copy(exe, dir.as_std_path().join(name)) {
        warn!("could not copy the updater into {dir}: {err}");
    }
}

/// Extract the archive, then record the license and the installed release.
///
/// Returns the number of entries extracted.
///
/// # Errors
///
/// Returns [`UpdaterError::Archive`] if extraction fails, or an I/O error if
/// the markers cannot be written.
pub fn place_release(
    extractor: &dyn ArchiveExtractor,
    archive: &Path,
    install_dir: &Utf8Path,
    manifest: &UpdaterManifest,
) -> Result<usize> {
    let extracted = extractor.extract_stripped(archive, install_dir.as_std_path())?;
    mark_license_accepted(install_dir.as_std_path())?;
    write_manifest(install_dir.as_std_path(), manifest)?;
    Ok(extracted.len())
}

/// Whether the server is started after installing.
///
/// A server that was running is always restarted; otherwise `--dont-start`
/// leaves it stopped.
///
/// # Examples
///
/// ```
/// use ts3_updater::install::should_start;
///
/// assert!(should_start(false, false));
/// assert!(should_start(true, true));
/// assert!(!should_start(true, false));
/// ```
#[must_use]
pub const fn should_start(dont_start: bool, was_running: bool) -> bool {
    !dont_start || was_running
}

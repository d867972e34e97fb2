//! Persistent install state.
//!
//! The server records a few facts as marker files in its directory, and the
//! updater keeps a small manifest of its own next to them. [`InstallState`]
//! reads all of them once, at the start of a run, so the rest of the pipeline
//! works from one value instead of probing the filesystem as it goes.

use crate::version::{LocalVersion, detect_local_version};
use log::warn;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Vendor control script with `start` and `stop` subcommands.
pub const START_SCRIPT: &str = "ts3server_startscript.sh";

/// PID file the control script writes while the server runs.
pub const PID_FILE: &str = "ts3server.pid";

/// Marker the server checks to skip its own license prompt.
pub const LICENSE_MARKER: &str = ".ts3server_license_accepted";

/// Changelog shipped with every release.
pub const CHANGELOG: &str = "CHANGELOG";

/// Directory holding the server's log files.
pub const LOG_DIR: &str = "logs";

/// Manifest written by the updater after each install.
pub const MANIFEST_FILE: &str = ".ts3updater.json";

/// Advisory lock guarding concurrent runs.
pub const LOCK_FILE: &str = ".ts3updater.lock";

/// Snapshot of everything the pipeline needs to know about an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallState {
    /// The control script is present, so this is an existing install.
    pub start_script_present: bool,
    /// The PID marker is present, so the server is considered running.
    pub service_running: bool,
    /// The license has been accepted on an earlier run.
    pub license_accepted: bool,
    /// The version believed to be installed.
    pub local_version: LocalVersion,
}

impl InstallState {
    /// Read marker files, manifest and version history from `dir`.
    ///
    /// Never fails: unreadable state reads as absent.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        Self {
            start_script_present: dir.join(START_SCRIPT).is_file(),
            service_running: dir.join(PID_FILE).exists(),
            license_accepted: dir.join(LICENSE_MARKER).exists(),
            local_version: detect_local_version(dir),
        }
    }
}

/// What the updater records about the release it installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterManifest {
    /// Installed server version.
    pub version: String,
    /// Digest of the archive it came from.
    pub checksum: String,
    /// Metadata key path the release was selected with.
    pub platform: String,
}

/// Read the updater manifest in `dir`.
///
/// Returns `None` when the file is missing or malformed; a malformed file
/// is logged and otherwise ignored, and the next install overwrites it.
#[must_use]
pub fn read_manifest(dir: &Path) -> Option<UpdaterManifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            warn!("ignoring malformed {}: {err}", path.display());
            None
        }
    }
}

/// Write the updater manifest into `dir`, replacing any previous one.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_manifest(dir: &Path, manifest: &UpdaterManifest) -> io::Result<()> {
    let json = serde_json::to_string_pretty(manifest).map_err(io::Error::other)?;
    std::fs::write(dir.join(MANIFEST_FILE), json)
}

/// Record license acceptance for the server and for later runs.
///
/// # Errors
///
/// Returns an I/O error if the marker cannot be created.
pub fn mark_license_accepted(dir: &Path) -> io::Result<()> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LICENSE_MARKER))
        .map(drop)
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;

    fn manifest() -> UpdaterManifest {
        UpdaterManifest {
            version: "3.13.7".to_owned(),
            checksum: "a".repeat(64),
            platform: "linux.x86_64".to_owned(),
        }
    }

    #[test]
    fn empty_directory_is_a_fresh_install() {
        let temp = tempfile::tempdir().expect("temp dir");
        let state = InstallState::load(temp.path());
        assert!(!state.start_script_present);
        assert!(!state.service_running);
        assert!(!state.license_accepted);
        assert_eq!(state.local_version, LocalVersion::Absent);
    }

    #[test]
    fn marker_files_are_read() {
        let temp = tempfile::tempdir().expect("temp dir");
        for name in [START_SCRIPT, PID_FILE, LICENSE_MARKER] {
            std::fs::write(temp.path().join(name), b"").expect("write marker");
        }

        let state = InstallState::load(temp.path());
        assert!(state.start_script_present);
        assert!(state.service_running);
        assert!(state.license_accepted);
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("temp dir");
        write_manifest(temp.path(), &manifest()).expect("write manifest");
        assert_eq!(read_manifest(temp.path()), Some(manifest()));
    }

    #[test]
    fn malformed_manifest_reads_as_absent() {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::write(temp.path().join(MANIFEST_FILE), "{not json").expect("write");
        assert_eq!(read_manifest(temp.path()), None);
    }

    #[test]
    fn license_marker_is_idempotent() {
        let temp = tempfile::tempdir().expect("temp dir");
        mark_license_accepted(temp.path()).expect("first mark");
        mark_license_accepted(temp.path()).expect("second mark");
        assert!(temp.path().join(LICENSE_MARKER).exists());
    }
}

//! Error types for the TeamSpeak 3 server updater.
//!
//! Every fatal condition of an update run is an [`UpdaterError`] variant with
//! a message that tells the operator what to do next. Each variant belongs to
//! exactly one [`ErrorKind`], which is what gets logged and what tests match
//! against.

use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

use crate::archive::ExtractionError;
use crate::download::DownloadError;
use crate::metadata::MetadataError;

/// Coarse classification of fatal updater failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required external executable is not on `PATH`.
    DependencyMissing,
    /// The host operating system has no server build.
    PlatformUnsupported,
    /// Metadata or archive could not be retrieved.
    NetworkFailure,
    /// The archive digest could not be verified.
    ChecksumMismatch,
    /// The install directory could not be prepared or written.
    InstallPathConflict,
    /// The operator did not accept the license.
    LicenseDeclined,
    /// The control script failed to stop or start the server.
    ServiceControl,
    /// Another updater run holds the install lock.
    LockBusy,
    /// Configuration could not be loaded.
    Config,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DependencyMissing => "dependency-missing",
            Self::PlatformUnsupported => "platform-unsupported",
            Self::NetworkFailure => "network-failure",
            Self::ChecksumMismatch => "checksum-mismatch",
            Self::InstallPathConflict => "install-path-conflict",
            Self::LicenseDeclined => "license-declined",
            Self::ServiceControl => "service-control",
            Self::LockBusy => "lock-busy",
            Self::Config => "config",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// Errors that abort an update run.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// A required executable could not be found.
    #[error("{tool} not found on PATH; {hint}")]
    DependencyMissing {
        /// Name of the missing executable.
        tool: &'static str,
        /// How to obtain it.
        hint: &'static str,
    },

    /// The operating system is not one the vendor ships a server for.
    #[error("this updater has not been ported to {os} yet")]
    PlatformUnsupported {
        /// The detected operating system.
        os: String,
    },

    /// The metadata document could not be fetched or did not describe this platform.
    #[error("could not load server metadata: {0}")]
    MetadataUnavailable(#[from] MetadataError),

    /// The metadata request itself failed.
    #[error("could not fetch server metadata: {0}")]
    MetadataFetch(#[source] DownloadError),

    /// No mirror produced an archive.
    #[error("download failed on every mirror:\n{}", format_attempts(.attempts))]
    MirrorsExhausted {
        /// One `(mirror, reason)` pair per failed attempt.
        attempts: Vec<(String, String)>,
    },

    /// The archive digest does not match the published checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest published in the metadata.
        expected: String,
        /// Digest of the downloaded archive.
        actual: String,
    },

    /// The archive digest could not be computed.
    #[error("could not compute the archive checksum: {reason}")]
    ChecksumUnavailable {
        /// Why the digest could not be computed.
        reason: String,
    },

    /// The archive could not be read or unpacked.
    #[error("archive error: {0}")]
    Archive(#[from] ExtractionError),

    /// The install directory could not be created or written.
    #[error(
        "could not create {path}: {reason}; run the updater from the directory \
         that should contain the server, or pass --install-dir"
    )]
    InstallPathConflict {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// The operator declined the license agreement.
    #[error("license agreement not accepted; nothing was installed")]
    LicenseDeclined,

    /// The control script returned a failure.
    #[error("failed to {action} the server: {message}")]
    ServiceControl {
        /// `start` or `stop`.
        action: &'static str,
        /// Failure description.
        message: String,
    },

    /// Another updater process is working on the same install.
    #[error("another update is already running in {path}")]
    LockBusy {
        /// Directory guarded by the lock.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration file {path}: {reason}")]
    Config {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Parse or read error.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl UpdaterError {
    /// Returns the taxonomy kind of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use ts3_updater::error::{ErrorKind, UpdaterError};
    ///
    /// assert_eq!(UpdaterError::LicenseDeclined.kind(), ErrorKind::LicenseDeclined);
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            Self::PlatformUnsupported { .. } => ErrorKind::PlatformUnsupported,
            Self::MetadataUnavailable(_) | Self::MetadataFetch(_) | Self::MirrorsExhausted { .. } => {
                ErrorKind::NetworkFailure
            }
            Self::ChecksumMismatch { .. } | Self::ChecksumUnavailable { .. } => {
                ErrorKind::ChecksumMismatch
            }
            Self::Archive(_) | Self::InstallPathConflict { .. } => ErrorKind::InstallPathConflict,
            Self::LicenseDeclined => ErrorKind::LicenseDeclined,
            Self::ServiceControl { .. } => ErrorKind::ServiceControl,
            Self::LockBusy { .. } => ErrorKind::LockBusy,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            #[cfg(any(test, feature = "test-support"))]
            Self::StubMismatch { .. } => ErrorKind::Io,
        }
    }
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(mirror, reason)| format!("  {mirror}: {reason}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias using [`UpdaterError`].
pub type Result<T> = std::result::Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn dependency_missing_names_tool_and_hint() {
        let err = UpdaterError::DependencyMissing {
            tool: "sh",
            hint: "install a POSIX shell",
        };
        let msg = err.to_string();
        assert!(msg.contains("sh not found"));
        assert!(msg.contains("POSIX shell"));
    }

    #[test]
    fn platform_unsupported_mentions_porting() {
        let err = UpdaterError::PlatformUnsupported {
            os: "windows".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "this updater has not been ported to windows yet"
        );
    }

    #[test]
    fn mirrors_exhausted_lists_every_attempt() {
        let err = UpdaterError::MirrorsExhausted {
            attempts: vec![
                ("teamspeak.com".to_owned(), "connection refused".to_owned()),
                ("4netplayers.de".to_owned(), "HTTP 404".to_owned()),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("teamspeak.com: connection refused"));
        assert!(msg.contains("4netplayers.de: HTTP 404"));
    }

    #[test]
    fn install_path_conflict_gives_guidance() {
        let err = UpdaterError::InstallPathConflict {
            path: Utf8PathBuf::from("/srv/teamspeak3-server_linux_amd64"),
            reason: "permission denied".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("--install-dir"));
        assert!(msg.contains("permission denied"));
    }

    #[rstest]
    #[case::dependency(
        UpdaterError::DependencyMissing { tool: "sh", hint: "" },
        ErrorKind::DependencyMissing
    )]
    #[case::platform(
        UpdaterError::PlatformUnsupported { os: "haiku".to_owned() },
        ErrorKind::PlatformUnsupported
    )]
    #[case::mirrors(
        UpdaterError::MirrorsExhausted { attempts: Vec::new() },
        ErrorKind::NetworkFailure
    )]
    #[case::checksum(
        UpdaterError::ChecksumMismatch { expected: "a".to_owned(), actual: "b".to_owned() },
        ErrorKind::ChecksumMismatch
    )]
    #[case::checksum_unavailable(
        UpdaterError::ChecksumUnavailable { reason: "gone".to_owned() },
        ErrorKind::ChecksumMismatch
    )]
    #[case::license(UpdaterError::LicenseDeclined, ErrorKind::LicenseDeclined)]
    #[case::io(UpdaterError::Io(std::io::Error::other("boom")), ErrorKind::Io)]
    fn errors_map_to_their_kind(#[case] err: UpdaterError, #[case] expected: ErrorKind) {
        assert_eq!(err.kind(), expected);
    }

    #[test]
    fn kind_display_is_kebab_case() {
        assert_eq!(
            ErrorKind::InstallPathConflict.to_string(),
            "install-path-conflict"
        );
    }
}

//! Installed-version detection and the version gate.
//!
//! The updater's own manifest is authoritative. Installs that predate the
//! updater have no manifest, so for those the version is recovered from the
//! server's log files (the server logs its version on every start) and, as a
//! last resort, from the release's changelog. This is a best-effort oracle:
//! a detection failure only means the release is installed again.

use crate::state::{CHANGELOG, LOG_DIR, read_manifest};
use log::debug;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

/// Matches the version the server logs at startup, e.g.
/// `TeamSpeak 3 Server 3.13.7 (2022-06-20 12:21:53)`.
const LOG_VERSION_PATTERN: &str = r"(?i)\bserver\s+(\d[\w.+-]*)";

/// Matches the release heading in the changelog, e.g.
/// `## Server Release 3.13.7 20 June 2022`.
const CHANGELOG_VERSION_PATTERN: &str = r"(?i)\bserver\s+release\s+(\d[\w.+-]*)";

/// The version believed to be installed locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalVersion {
    /// Read from the updater manifest.
    Recorded(String),
    /// Recovered from server logs or the changelog.
    Detected(String),
    /// No install, or no trace of its version.
    Absent,
}

impl LocalVersion {
    /// The version string, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Recorded(version) | Self::Detected(version) => Some(version),
            Self::Absent => None,
        }
    }
}

impl fmt::Display for LocalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("none"))
    }
}

/// Outcome of comparing the local and published versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionDecision {
    /// The published version is already installed.
    UpToDate,
    /// Nothing is installed yet.
    FreshInstall,
    /// A different version is installed.
    Upgrade {
        /// The installed version.
        from: String,
    },
}

impl VersionDecision {
    /// Whether the published release should be downloaded.
    #[must_use]
    pub const fn needs_install(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Compare the installed version with the published one.
///
/// Any difference counts as an upgrade; versions are not ordered, so a
/// published downgrade is installed too.
///
/// # Examples
///
/// ```
/// use ts3_updater::version::{LocalVersion, VersionDecision, compare_versions};
///
/// let local = LocalVersion::Recorded("3.13.6".to_owned());
/// assert_eq!(
///     compare_versions(&local, "3.13.7"),
///     VersionDecision::Upgrade { from: "3.13.6".to_owned() }
/// );
/// assert_eq!(compare_versions(&LocalVersion::Absent, "3.13.7"), VersionDecision::FreshInstall);
/// ```
#[must_use]
pub fn compare_versions(local: &LocalVersion, remote: &str) -> VersionDecision {
    match local.as_str() {
        None => VersionDecision::FreshInstall,
        Some(installed) if installed == remote => VersionDecision::UpToDate,
        Some(installed) => VersionDecision::Upgrade {
            from: installed.to_owned(),
        },
    }
}

/// Work out which version is installed in `dir`.
#[must_use]
pub fn detect_local_version(dir: &Path) -> LocalVersion {
    if let Some(manifest) = read_manifest(dir) {
        return LocalVersion::Recorded(manifest.version);
    }

    if !dir.join(CHANGELOG).is_file() {
        return LocalVersion::Absent;
    }

    let detected = scan_logs(&dir.join(LOG_DIR)).or_else(|| scan_changelog(&dir.join(CHANGELOG)));
    detected.map_or(LocalVersion::Absent, |version| {
        debug!("detected installed version {version} from server history");
        LocalVersion::Detected(version)
    })
}

/// Find the most recent version line across the server logs.
///
/// Log names begin with a timestamp, so reverse name order is newest first;
/// within a file the last match wins.
fn scan_logs(log_dir: &Path) -> Option<String> {
    let pattern = Regex::new(LOG_VERSION_PATTERN).ok()?;
    let mut logs: Vec<PathBuf> = std::fs::read_dir(log_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .collect();
    logs.sort();

    logs.iter().rev().find_map(|log| {
        let content = std::fs::read_to_string(log).ok()?;
        content
            .lines()
            .rev()
            .find_map(|line| capture_version(&pattern, line))
    })
}

/// Take the first release heading of the changelog.
fn scan_changelog(changelog: &Path) -> Option<String> {
    let pattern = Regex::new(CHANGELOG_VERSION_PATTERN).ok()?;
    let content = std::fs::read_to_string(changelog).ok()?;
    content
        .lines()
        .find_map(|line| capture_version(&pattern, line))
}

fn capture_version(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-', '+']).to_owned())
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;
    use crate::state::{UpdaterManifest, write_manifest};
    use rstest::rstest;

    fn install_dir() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(temp.path().join(LOG_DIR)).expect("create logs");
        temp
    }

    fn write_log(dir: &Path, name: &str, lines: &[&str]) {
        std::fs::write(dir.join(LOG_DIR).join(name), lines.join("\n")).expect("write log");
    }

    #[test]
    fn no_changelog_means_absent() {
        let temp = install_dir();
        write_log(temp.path(), "ts3server_1.log", &["TeamSpeak 3 Server 3.13.7"]);
        assert_eq!(detect_local_version(temp.path()), LocalVersion::Absent);
    }

    #[test]
    fn newest_log_line_wins() {
        let temp = install_dir();
        std::fs::write(temp.path().join(CHANGELOG), "").expect("changelog");
        write_log(
            temp.path(),
            "ts3server_2022-01-01__10_00_00.000000_1.log",
            &["|INFO |ServerLibPriv |   |TeamSpeak 3 Server 3.13.5 (2021-05-01)"],
        );
        write_log(
            temp.path(),
            "ts3server_2023-06-01__10_00_00.000000_1.log",
            &[
                "|INFO |ServerLibPriv |   |TeamSpeak 3 Server 3.13.6 (2022-01-01)",
                "|INFO |ServerLibPriv |   |TeamSpeak 3 Server 3.13.7 (2022-06-20 12:21:53)",
                "|INFO |VirtualServer |1  |listening on 0.0.0.0:9987",
            ],
        );

        assert_eq!(
            detect_local_version(temp.path()),
            LocalVersion::Detected("3.13.7".to_owned())
        );
    }

    #[test]
    fn falls_back_to_changelog_heading() {
        let temp = install_dir();
        std::fs::write(
            temp.path().join(CHANGELOG),
            "## Server Release 3.13.7 20 June 2022\n### Fixed\n## Server Release 3.13.6\n",
        )
        .expect("changelog");

        assert_eq!(
            detect_local_version(temp.path()),
            LocalVersion::Detected("3.13.7".to_owned())
        );
    }

    #[test]
    fn manifest_takes_precedence_over_logs() {
        let temp = install_dir();
        std::fs::write(temp.path().join(CHANGELOG), "").expect("changelog");
        write_log(temp.path(), "ts3server_1.log", &["TeamSpeak 3 Server 3.13.5"]);
        write_manifest(
            temp.path(),
            &UpdaterManifest {
                version: "3.13.7".to_owned(),
                checksum: "a".repeat(64),
                platform: "linux.x86_64".to_owned(),
            },
        )
        .expect("write manifest");

        assert_eq!(
            detect_local_version(temp.path()),
            LocalVersion::Recorded("3.13.7".to_owned())
        );
    }

    #[rstest]
    #[case::mixed_case("TEAMSPEAK 3 SERVER 3.12.1", Some("3.12.1"))]
    #[case::not_whole_word("ts3server 3.12.1", None)]
    #[case::no_version("Server shutting down", None)]
    #[case::trailing_dot("server 3.12.1.", Some("3.12.1"))]
    fn log_pattern_is_case_insensitive_and_whole_word(
        #[case] line: &str,
        #[case] expected: Option<&str>,
    ) {
        let pattern = Regex::new(LOG_VERSION_PATTERN).expect("valid pattern");
        assert_eq!(capture_version(&pattern, line).as_deref(), expected);
    }

    #[rstest]
    #[case::absent(LocalVersion::Absent, VersionDecision::FreshInstall)]
    #[case::same(LocalVersion::Detected("3.13.7".to_owned()), VersionDecision::UpToDate)]
    #[case::older(
        LocalVersion::Recorded("3.13.6".to_owned()),
        VersionDecision::Upgrade { from: "3.13.6".to_owned() }
    )]
    fn gate_decides_from_local_version(
        #[case] local: LocalVersion,
        #[case] expected: VersionDecision,
    ) {
        let decision = compare_versions(&local, "3.13.7");
        assert_eq!(decision.needs_install(), expected != VersionDecision::UpToDate);
        assert_eq!(decision, expected);
    }

    #[test]
    fn absent_displays_as_none() {
        assert_eq!(LocalVersion::Absent.to_string(), "none");
    }
}

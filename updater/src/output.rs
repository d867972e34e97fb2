//! Operator-facing progress messages.
//!
//! Logging goes through the `log` facade and is for diagnosing the updater.
//! The lines built here are the updater's actual output: what it found, what
//! it did, and where. They are written to an injected writer so tests can
//! capture them.

use crate::version::LocalVersion;
use camino::Utf8Path;
use std::fmt::Display;
use std::io::Write;

/// Write one line, ignoring failures of the terminal itself.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Progress sink that can be silenced with `--quiet`.
pub struct Reporter<'a> {
    out: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Reporter<'a> {
    /// Report to `out` unless `quiet`.
    #[must_use]
    pub const fn new(out: &'a mut dyn Write, quiet: bool) -> Self {
        Self { out, quiet }
    }

    /// Write a progress line.
    pub fn line(&mut self, message: impl Display) {
        if !self.quiet {
            write_stderr_line(&mut *self.out, message);
        }
    }
}

/// The installed release is current.
#[must_use]
pub fn up_to_date_message(version: &str) -> String {
    format!("The installed server is up-to-date. Version: {version}")
}

/// A different release is published.
#[must_use]
pub fn update_available_message(local: &LocalVersion, remote: &str) -> String {
    match local {
        LocalVersion::Absent => format!("No installed server found. Latest version: {remote}"),
        installed => format!("New version available: {remote} (installed: {installed})"),
    }
}

/// Installation finished.
#[must_use]
pub fn installed_message(version: &str, dir: &Utf8Path) -> String {
    format!("Installed TeamSpeak 3 server {version} in {dir}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_reporter_writes_nothing() {
        let mut buffer = Vec::new();
        let mut reporter = Reporter::new(&mut buffer, true);
        reporter.line("hidden");
        assert!(buffer.is_empty());
    }

    #[test]
    fn update_message_names_both_versions() {
        let local = LocalVersion::Detected("3.13.6".to_owned());
        let msg = update_available_message(&local, "3.13.7");
        assert!(msg.contains("3.13.7"));
        assert!(msg.contains("installed: 3.13.6"));
    }

    #[test]
    fn fresh_install_message_has_no_local_version() {
        let msg = update_available_message(&LocalVersion::Absent, "3.13.7");
        assert_eq!(msg, "No installed server found. Latest version: 3.13.7");
    }
}

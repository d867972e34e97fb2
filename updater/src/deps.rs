//! Capability detection for external executables.
//!
//! HTTP, JSON and archive handling are linked into the updater, so the only
//! executables it needs from the host are the shell that runs the vendor's
//! control script and, optionally, a system checksum tool. Both are probed
//! once at startup and the result is carried through the run as
//! [`Capabilities`].

use crate::checksum::ChecksumStrategy;
use crate::error::{Result, UpdaterError};
use log::debug;
use std::process::{Command, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ts3_updater::deps::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("sha256sum", &["server.tar"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), ts3_updater::error::UpdaterError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(UpdaterError::from)
    }
}

/// Answers whether an executable can be found on `PATH`.
#[cfg_attr(test, mockall::automock)]
pub trait ToolProbe {
    /// Returns `true` when `tool` resolves to an executable.
    fn is_available(&self, tool: &str) -> bool;
}

/// Probes `PATH` with the `which` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathProbe;

impl ToolProbe for PathProbe {
    fn is_available(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }
}

/// An executable the updater cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredTool {
    /// Executable name.
    pub name: &'static str,
    /// How to obtain it when missing.
    pub hint: &'static str,
}

/// Executables checked before any side effect.
pub const REQUIRED_TOOLS: &[RequiredTool] = &[RequiredTool {
    name: "sh",
    hint: "a POSIX shell is needed to run ts3server_startscript.sh",
}];

/// Checksum tools in priority order, each with the arguments that make it
/// print a SHA-256 digest.
pub const CHECKSUM_TOOLS: &[ChecksumStrategy] = &[
    ChecksumStrategy::Sha256sum,
    ChecksumStrategy::Shasum,
    ChecksumStrategy::BsdSha256,
];

/// Host capabilities selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// How archive digests are computed for this run.
    pub checksum: ChecksumStrategy,
}

/// Verify required tools and select a checksum strategy.
///
/// # Errors
///
/// Returns [`UpdaterError::DependencyMissing`] naming the first required
/// tool that is not available.
///
/// # Examples
///
/// ```no_run
/// use ts3_updater::deps::{PathProbe, detect_capabilities};
///
/// let caps = detect_capabilities(&PathProbe)?;
/// println!("checksums via {}", caps.checksum);
/// # Ok::<(), ts3_updater::error::UpdaterError>(())
/// ```
pub fn detect_capabilities(probe: &dyn ToolProbe) -> Result<Capabilities> {
    check_required_tools(probe, REQUIRED_TOOLS)?;
    let checksum = select_checksum_strategy(probe);
    debug!("selected checksum strategy: {checksum}");
    Ok(Capabilities { checksum })
}

/// Fail on the first tool in `tools` that `probe` cannot find.
///
/// # Errors
///
/// Returns [`UpdaterError::DependencyMissing`] for the first missing tool.
pub fn check_required_tools(probe: &dyn ToolProbe, tools: &[RequiredTool]) -> Result<()> {
    tools
        .iter()
        .find(|tool| !probe.is_available(tool.name))
        .map_or(Ok(()), |missing| {
            Err(UpdaterError::DependencyMissing {
                tool: missing.name,
                hint: missing.hint,
            })
        })
}

/// Pick the first available checksum tool, or the built-in digest when the
/// host has none.
#[must_use]
pub fn select_checksum_strategy(probe: &dyn ToolProbe) -> ChecksumStrategy {
    CHECKSUM_TOOLS
        .iter()
        .copied()
        .find(|strategy| {
            strategy
                .program()
                .is_some_and(|program| probe.is_available(program))
        })
        .unwrap_or(ChecksumStrategy::Builtin)
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;

    fn probe_with(available: &'static [&'static str]) -> MockToolProbe {
        let mut probe = MockToolProbe::new();
        probe
            .expect_is_available()
            .returning(move |tool| available.iter().any(|candidate| *candidate == tool));
        probe
    }

    #[test]
    fn missing_shell_is_reported() {
        let probe = probe_with(&["sha256sum"]);
        let err = detect_capabilities(&probe).expect_err("sh missing");
        assert_eq!(err.kind(), ErrorKind::DependencyMissing);
        assert!(err.to_string().contains("sh not found"));
    }

    #[test]
    fn reports_first_missing_tool_in_order() {
        let tools = [
            RequiredTool {
                name: "present",
                hint: "",
            },
            RequiredTool {
                name: "absent-one",
                hint: "first",
            },
            RequiredTool {
                name: "absent-two",
                hint: "second",
            },
        ];
        let probe = probe_with(&["present"]);
        let err = check_required_tools(&probe, &tools).expect_err("missing tool");
        assert!(matches!(
            err,
            UpdaterError::DependencyMissing { tool: "absent-one", .. }
        ));
    }

    #[rstest]
    #[case::all(&["sh", "sha256sum", "shasum", "sha256"], ChecksumStrategy::Sha256sum)]
    #[case::shasum_only(&["sh", "shasum", "sha256"], ChecksumStrategy::Shasum)]
    #[case::bsd_only(&["sh", "sha256"], ChecksumStrategy::BsdSha256)]
    #[case::none(&["sh"], ChecksumStrategy::Builtin)]
    fn selects_checksum_tool_by_priority(
        #[case] available: &'static [&'static str],
        #[case] expected: ChecksumStrategy,
    ) {
        let probe = probe_with(available);
        let caps = detect_capabilities(&probe).expect("sh available");
        assert_eq!(caps.checksum, expected);
    }
}

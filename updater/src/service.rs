//! Control of the installed server through its vendor script.
//!
//! The updater never manages the server process itself. It runs
//! `ts3server_startscript.sh stop` before replacing files and
//! `ts3server_startscript.sh start` afterwards, with the script's output
//! passed straight through to the operator's terminal.

use crate::error::{Result, UpdaterError};
use crate::state::START_SCRIPT;
use log::{debug, info};
use std::path::Path;
use std::process::Command;

/// Stops and starts the server installed in a directory.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceControl {
    /// Stop the server running from `install_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ServiceControl`] if the script cannot be run or
    /// reports failure.
    fn stop(&self, install_dir: &Path) -> Result<()>;

    /// Start the server in `install_dir`, passing `args` to the script.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ServiceControl`] if the script cannot be run or
    /// reports failure.
    fn start(&self, install_dir: &Path, args: &[String]) -> Result<()>;
}

/// Runs the vendor control script with `sh`.
///
/// The script is run through the shell rather than executed directly so a
/// freshly extracted copy works even when the archive lost its mode bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptService;

impl ScriptService {
    fn invoke(install_dir: &Path, action: &'static str, args: &[String]) -> Result<()> {
        debug!(
            "running {START_SCRIPT} {action} {args:?} in {}",
            install_dir.display()
        );
        let status = Command::new("sh")
            .arg(START_SCRIPT)
            .arg(action)
            .args(args)
            .current_dir(install_dir)
            .status()
            .map_err(|e| UpdaterError::ServiceControl {
                action,
                message: format!("could not run {START_SCRIPT}: {e}"),
            })?;

        if !status.success() {
            return Err(UpdaterError::ServiceControl {
                action,
                message: format!("{START_SCRIPT} {action} exited with {status}"),
            });
        }
        info!("server {action} completed");
        Ok(())
    }
}

impl ServiceControl for ScriptService {
    fn stop(&self, install_dir: &Path) -> Result<()> {
        Self::invoke(install_dir, "stop", &[])
    }

    fn start(&self, install_dir: &Path, args: &[String]) -> Result<()> {
        Self::invoke(install_dir, "start", args)
    }
}

#[cfg(all(test, unix))]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn install_with_script(body: &str) -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::write(temp.path().join(START_SCRIPT), body).expect("write script");
        temp
    }

    #[test]
    fn start_forwards_arguments_to_the_script() {
        let temp = install_with_script("echo \"$@\" > invoked.txt\n");
        ScriptService
            .start(
                temp.path(),
                &["--dont-start".to_owned(), "inifile=ts3server.ini".to_owned()],
            )
            .expect("script succeeds");

        let invoked = std::fs::read_to_string(temp.path().join("invoked.txt")).expect("marker");
        assert_eq!(invoked.trim(), "start --dont-start inifile=ts3server.ini");
    }

    #[test]
    fn stop_runs_without_extra_arguments() {
        let temp = install_with_script("echo \"$@\" > invoked.txt\n");
        ScriptService.stop(temp.path()).expect("script succeeds");

        let invoked = std::fs::read_to_string(temp.path().join("invoked.txt")).expect("marker");
        assert_eq!(invoked.trim(), "stop");
    }

    #[test]
    fn failing_script_is_a_service_control_error() {
        let temp = install_with_script("exit 3\n");
        let err = ScriptService.stop(temp.path()).expect_err("script fails");
        assert_eq!(err.kind(), ErrorKind::ServiceControl);
        assert!(err.to_string().contains("failed to stop the server"));
    }
}

//! TeamSpeak 3 server updater CLI entrypoint.
//!
//! This binary resolves the run configuration, installs the signal cleanup
//! handler and hands over to the update pipeline. Progress goes to stderr;
//! the license text and prompt use the terminal's stdout and stdin.

use camino::Utf8PathBuf;
use log::error;
use std::io::Write;
use ts3_updater::cli::Cli;
use ts3_updater::config::UpdateConfig;
use ts3_updater::error::{Result, UpdaterError};
use ts3_updater::logging::init_logging;
use ts3_updater::output::write_stderr_line;
use ts3_updater::pipeline::{Terminal, UpdateOutcome, run_update};
use ts3_updater::workdir::install_signal_cleanup;

fn main() {
    let cli = match Cli::try_parse_args(raw_args()) {
        Ok(cli) => cli,
        Err(err) => {
            if err.print().is_err() {
                // Best-effort output; the exit code still reports the failure.
            }
            std::process::exit(exit_code_for_parse_error(&err));
        }
    };
    init_logging(cli.verbosity, cli.quiet);

    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<UpdateOutcome> {
    install_signal_cleanup()?;

    let cwd = current_dir()?;
    let mut config = UpdateConfig::resolve(cli, &cwd)?;
    config.self_exe = std::env::current_exe().ok();

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut stdout = std::io::stdout();
    run_update(
        &config,
        &mut Terminal {
            input: &mut input,
            output: &mut stdout,
            progress: stderr,
        },
    )
}

fn raw_args() -> impl Iterator<Item = String> {
    std::env::args_os().map(|arg| arg.to_string_lossy().into_owned())
}

/// Help and version requests succeed; every other usage error is a failed
/// run like any other.
fn exit_code_for_parse_error(err: &clap::Error) -> i32 {
    i32::from(err.use_stderr())
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| UpdaterError::InstallPathConflict {
        path: Utf8PathBuf::from(e.as_path().to_string_lossy().into_owned()),
        reason: "current directory is not valid UTF-8".to_owned(),
    })
}

fn exit_code_for_run_result(result: Result<UpdateOutcome>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            error!("update failed ({})", err.kind());
            write_stderr_line(stderr, err);
            1
        }
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse_error(args: &[&str]) -> clap::Error {
        Cli::try_parse_args(args.iter().map(|arg| (*arg).to_owned()))
            .expect_err("arguments stop parsing")
    }

    #[rstest]
    #[case::help(&["ts3-updater", "--help"], 0)]
    #[case::version(&["ts3-updater", "--version"], 0)]
    #[case::bad_timeout(&["ts3-updater", "--timeout", "soon"], 1)]
    #[case::missing_value(&["ts3-updater", "inifile=ts3server.ini", "-d"], 1)]
    #[case::conflict(&["ts3-updater", "-q", "-v"], 1)]
    fn exit_code_for_parse_error_is_zero_or_one(#[case] args: &[&str], #[case] expected: i32) {
        assert_eq!(exit_code_for_parse_error(&parse_error(args)), expected);
    }

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let outcome = UpdateOutcome::UpToDate {
            version: "3.13.7".to_owned(),
        };
        let exit_code = exit_code_for_run_result(Ok(outcome), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[rstest]
    #[case::license(UpdaterError::LicenseDeclined, "license agreement not accepted")]
    #[case::platform(
        UpdaterError::PlatformUnsupported { os: "windows".to_owned() },
        "not been ported to windows"
    )]
    fn exit_code_for_run_result_prints_error_and_returns_one(
        #[case] err: UpdaterError,
        #[case] expected: &str,
    ) {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains(expected));
    }
}

//! Update pipeline orchestration.
//!
//! One run is a fixed sequence of stages: capability detection, platform
//! resolution, metadata fetch, version gate, download, checksum
//! verification, license gate, install and start. Each stage either hands
//! its result to the next or ends the run with an [`UpdaterError`]. The
//! working directory is scoped to the stages that need it, so it is gone by
//! the time the run returns, whichever way it returns.

use camino::Utf8PathBuf;
use log::info;
use std::io::{BufRead, Write};

use crate::archive::{ArchiveExtractor, TarExtractor};
use crate::checksum::verify_archive;
use crate::config::UpdateConfig;
use crate::deps::{
    Capabilities, CommandExecutor, PathProbe, SystemCommandExecutor, ToolProbe,
    detect_capabilities,
};
use crate::download::{HttpDownloader, ReleaseDownloader, download_from_mirrors};
use crate::error::{Result, UpdaterError};
use crate::install::{place_release, prepare_install_dir, should_start};
use crate::license::ensure_license_accepted;
use crate::lock::UpdateLock;
use crate::metadata::{ServerRelease, parse_release};
use crate::output::{Reporter, installed_message, up_to_date_message, update_available_message};
use crate::platform::PlatformKey;
use crate::service::{ScriptService, ServiceControl};
use crate::state::{InstallState, UpdaterManifest};
use crate::version::{LocalVersion, compare_versions};
use crate::workdir::WorkDir;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The published version is already installed.
    UpToDate {
        /// The installed version.
        version: String,
    },
    /// `--check-only` found a different version and stopped there.
    UpdateAvailable {
        /// What is installed now.
        local: LocalVersion,
        /// What is published.
        remote: String,
    },
    /// The release was installed.
    Installed {
        /// The installed version.
        version: String,
        /// Where it was installed.
        dir: Utf8PathBuf,
        /// Whether the server was started afterwards.
        started: bool,
    },
}

/// The collaborators a run talks to.
pub struct Collaborators<'a> {
    /// Finds external executables.
    pub probe: &'a dyn ToolProbe,
    /// Fetches metadata and archives.
    pub downloader: &'a dyn ReleaseDownloader,
    /// Runs the checksum tool.
    pub executor: &'a dyn CommandExecutor,
    /// Reads and unpacks archives.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Stops and starts the server.
    pub service: &'a dyn ServiceControl,
}

/// Where the run reads answers from and writes to.
pub struct Terminal<'a> {
    /// Answers to the license prompt.
    pub input: &'a mut dyn BufRead,
    /// License text and prompt.
    pub output: &'a mut dyn Write,
    /// Progress lines.
    pub progress: &'a mut dyn Write,
}

/// Run an update with the production HTTP client, extractor, tool probe and
/// control script.
///
/// # Errors
///
/// Returns the error of the first stage that fails.
pub fn run_update(config: &UpdateConfig, terminal: &mut Terminal<'_>) -> Result<UpdateOutcome> {
    let downloader = HttpDownloader::new(config.timeout);
    let deps = Collaborators {
        probe: &PathProbe,
        downloader: &downloader,
        executor: &SystemCommandExecutor,
        extractor: &TarExtractor,
        service: &ScriptService,
    };
    run_update_with(config, &deps, terminal)
}

/// Testable inner function with injected collaborators.
///
/// The production entry point [`run_update`] delegates here with real
/// implementations; tests inject fakes.
///
/// # Errors
///
/// Returns the error of the first stage that fails.
pub fn run_update_with(
    config: &UpdateConfig,
    deps: &Collaborators<'_>,
    terminal: &mut Terminal<'_>,
) -> Result<UpdateOutcome> {
    let mut reporter = Reporter::new(&mut *terminal.progress, config.quiet);

    // Step 1: Host capabilities and platform, before any side effect.
    let caps = detect_capabilities(deps.probe)?;
    let platform = PlatformKey::for_host(&config.host)?;

    // Step 2: Published release for this platform.
    let release = fetch_release(deps.downloader, &config.metadata_url, &platform)?;
    info!("published version for {platform}: {}", release.version());

    // Step 3: Version gate.
    let state = InstallState::load(config.base_dir.as_std_path());
    let decision = compare_versions(&state.local_version, release.version());
    if !decision.needs_install() {
        reporter.line(up_to_date_message(release.version()));
        return Ok(UpdateOutcome::UpToDate {
            version: release.version().to_owned(),
        });
    }
    reporter.line(update_available_message(
        &state.local_version,
        release.version(),
    ));
    if config.check_only {
        return Ok(UpdateOutcome::UpdateAvailable {
            local: state.local_version,
            remote: release.version().to_owned(),
        });
    }

    // Steps 4-7 need the archive; the working directory lives exactly as long.
    let workdir = WorkDir::create_in(&config.work_root)?;
    let placement = install_release(
        config,
        deps,
        &caps,
        &platform,
        &release,
        &state,
        &workdir,
        terminal,
    )?;
    drop(workdir);
    reporter = Reporter::new(&mut *terminal.progress, config.quiet);
    let Placement::Placed {
        dir,
        was_running,
        lock,
    } = placement
    else {
        reporter.line(up_to_date_message(release.version()));
        return Ok(UpdateOutcome::UpToDate {
            version: release.version().to_owned(),
        });
    };
    reporter.line(installed_message(release.version(), &dir));

    // Step 8: Start.
    let started = should_start(config.dont_start, was_running);
    if started {
        reporter.line("Starting the server...");
        deps.service
            .start(dir.as_std_path(), &config.forwarded_args)?;
    }

    drop(lock);

    Ok(UpdateOutcome::Installed {
        version: release.version().to_owned(),
        dir,
        started,
    })
}

fn fetch_release(
    downloader: &dyn ReleaseDownloader,
    url: &str,
    platform: &PlatformKey,
) -> Result<ServerRelease> {
    let json = downloader
        .fetch_metadata(url)
        .map_err(UpdaterError::MetadataFetch)?;
    Ok(parse_release(&json, platform)?)
}

/// What the install stage left behind.
enum Placement {
    /// The release is in `dir`; `lock` is held until the server is started.
    Placed {
        dir: Utf8PathBuf,
        was_running: bool,
        lock: UpdateLock,
    },
    /// Another run installed the release while this one was downloading.
    AlreadyCurrent,
}

#[expect(
    clippy::too_many_arguments,
    reason = "each stage input is a distinct value owned by the caller"
)]
fn install_release(
    config: &UpdateConfig,
    deps: &Collaborators<'_>,
    caps: &Capabilities,
    platform: &PlatformKey,
    release: &ServerRelease,
    state: &InstallState,
    workdir: &WorkDir,
    terminal: &mut Terminal<'_>,
) -> Result<Placement> {
    let archive = workdir.archive_path();
    let mut reporter = Reporter::new(&mut *terminal.progress, config.quiet);

    // Step 4: Download, first mirror that delivers wins.
    reporter.line(format!("Downloading server {}...", release.version()));
    let mirror = download_from_mirrors(deps.downloader, release.mirrors(), &archive)?;

    // Step 5: Checksum.
    reporter.line(format!(
        "Verifying archive from {} with {}...",
        mirror.name, caps.checksum
    ));
    verify_archive(caps.checksum, deps.executor, &archive, release.checksum())?;

    // Step 6: License.
    let top_level = deps.extractor.top_level_dir(&archive)?;
    let decision = ensure_license_accepted(
        state.license_accepted,
        config.accept_license,
        || {
            deps.extractor
                .read_license(&archive, &top_level)
                .map_err(UpdaterError::from)
        },
        &mut *terminal.input,
        &mut *terminal.output,
    )?;
    info!("license gate passed: {decision:?}");

    // Step 7: Stop, place, extract, record. The lock is held through the
    // restart so concurrent runs cannot interleave stop and start.
    let lock = UpdateLock::acquire(&config.base_dir)?;
    // The install may have changed while the archive was downloaded; only
    // what is on disk under the lock counts.
    let current = InstallState::load(config.base_dir.as_std_path());
    if !compare_versions(&current.local_version, release.version()).needs_install() {
        info!("{} was installed by another run", release.version());
        return Ok(Placement::AlreadyCurrent);
    }
    let prepared = prepare_install_dir(
        &config.base_dir,
        &top_level,
        &current,
        deps.service,
        config.self_exe.as_deref(),
    )?;
    reporter.line(format!("Extracting into {}...", prepared.dir));
    let manifest = UpdaterManifest {
        version: release.version().to_owned(),
        checksum: release.checksum().to_string(),
        platform: platform.to_string(),
    };
    let entries = place_release(deps.extractor, &archive, &prepared.dir, &manifest)?;
    info!("extracted {entries} entries into {}", prepared.dir);

    Ok(Placement::Placed {
        dir: prepared.dir,
        was_running: prepared.was_running,
        lock,
    })
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
#[path = "pipeline_tests.rs"]
mod tests;

//! Run configuration.
//!
//! Settings come from three layers, highest priority first: command-line
//! options, an optional `ts3updater.toml` in the install directory, and
//! built-in defaults. The merged result is an [`UpdateConfig`], which is all
//! the pipeline sees.

use crate::cli::Cli;
use crate::download::{DEFAULT_METADATA_URL, DEFAULT_TIMEOUT};
use crate::error::{Result, UpdaterError};
use crate::platform::Host;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the optional configuration file in the install directory.
pub const CONFIG_FILE: &str = "ts3updater.toml";

/// Settings read from `ts3updater.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Metadata endpoint to query.
    pub metadata_url: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load `ts3updater.toml` from `dir`, or an empty config if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::Config`] when the file exists but cannot be
    /// read or parsed.
    pub fn load(dir: &Utf8Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(UpdaterError::Config {
                    path,
                    reason: err.to_string(),
                });
            }
        };
        debug!("loading {path}");
        toml::from_str(&content).map_err(|e| UpdaterError::Config {
            path,
            reason: e.to_string(),
        })
    }
}

/// Everything one update run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Directory holding an install, or to receive a fresh one.
    pub base_dir: Utf8PathBuf,
    /// Metadata endpoint.
    pub metadata_url: String,
    /// Global HTTP timeout per request.
    pub timeout: Duration,
    /// `--dont-start`.
    pub dont_start: bool,
    /// `--accept-license`.
    pub accept_license: bool,
    /// `--check-only`.
    pub check_only: bool,
    /// Suppress progress output.
    pub quiet: bool,
    /// Arguments handed to the start script.
    pub forwarded_args: Vec<String>,
    /// Where working directories are created.
    pub work_root: PathBuf,
    /// The updater binary copied into fresh installs, if known.
    pub self_exe: Option<PathBuf>,
    /// Machine whose server build is installed.
    pub host: Host,
}

impl UpdateConfig {
    /// Configuration with built-in defaults for `base_dir`.
    #[must_use]
    pub fn new(base_dir: Utf8PathBuf) -> Self {
        Self {
            base_dir,
            metadata_url: DEFAULT_METADATA_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            dont_start: false,
            accept_license: false,
            check_only: false,
            quiet: false,
            forwarded_args: Vec::new(),
            work_root: std::env::temp_dir(),
            self_exe: None,
            host: Host::current(),
        }
    }

    /// Merge command-line options over `ts3updater.toml` over defaults.
    ///
    /// A relative `--install-dir` is resolved against `cwd`. The start script
    /// receives [`Cli::start_args`].
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::Config`] when the configuration file is
    /// malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use ts3_updater::cli::Cli;
    /// use ts3_updater::config::UpdateConfig;
    ///
    /// let temp = tempfile::tempdir()?;
    /// let cwd = Utf8Path::from_path(temp.path()).expect("UTF-8 temp dir");
    /// let cli = Cli { check_only: true, timeout: Some(5), ..Cli::default() };
    ///
    /// let config = UpdateConfig::resolve(&cli, cwd)?;
    /// assert!(config.check_only);
    /// assert_eq!(config.timeout.as_secs(), 5);
    /// assert_eq!(config.base_dir, cwd);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn resolve(cli: &Cli, cwd: &Utf8Path) -> Result<Self> {
        let base_dir = cli
            .install_dir
            .as_deref()
            .map_or_else(|| cwd.to_owned(), |dir| cwd.join(dir));
        let file = FileConfig::load(&base_dir)?;
        let defaults = Self::new(base_dir);

        Ok(Self {
            metadata_url: cli
                .metadata_url
                .clone()
                .or(file.metadata_url)
                .unwrap_or(defaults.metadata_url),
            timeout: cli
                .timeout
                .or(file.timeout_secs)
                .map_or(defaults.timeout, Duration::from_secs),
            dont_start: cli.dont_start,
            accept_license: cli.accept_license,
            check_only: cli.check_only,
            quiet: cli.quiet,
            forwarded_args: cli.start_args(),
            ..defaults
        })
    }
}

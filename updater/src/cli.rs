//! CLI argument definitions for the TeamSpeak 3 server updater.
//!
//! The four update flags are presence-only and may appear in any order,
//! including after server arguments. Tokens that are not updater options are
//! set aside before clap sees them and handed on to the server's start script.

use camino::Utf8PathBuf;
use clap::{CommandFactory, Parser};

/// Download, verify, install and restart the TeamSpeak 3 server.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "ts3-updater")]
#[command(version, about)]
#[command(long_about = concat!(
    "Download, verify, install and restart the TeamSpeak 3 server.\n\n",
    "The updater compares the locally installed server with the version the ",
    "vendor publishes, and when they differ downloads the release for this ",
    "platform, checks its SHA-256 digest, extracts it over the install ",
    "directory and restarts the server if it was running.\n\n",
    "Run it from the directory containing ts3server_startscript.sh to upgrade ",
    "an install, or from the directory that should contain a new install.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Upgrade the server in the current directory:\n",
    "    $ ts3-updater\n\n",
    "  Report whether an update exists without installing:\n",
    "    $ ts3-updater --check-only\n\n",
    "  Unattended first install that leaves the server stopped:\n",
    "    $ ts3-updater --accept-license --dont-start\n\n",
    "  Arguments the updater does not know are passed to the server:\n",
    "    $ ts3-updater inifile=ts3server.ini\n\n",
    "CONFIGURATION:\n",
    "  ts3updater.toml in the install directory may set metadata_url and\n",
    "  timeout_secs. Command-line options take precedence.",
))]
pub struct Cli {
    /// Do not start the server after installing unless it was running before.
    #[arg(long)]
    pub dont_start: bool,

    /// Accept the server license without prompting.
    #[arg(long)]
    pub accept_license: bool,

    /// Report whether an update is available and exit without downloading.
    #[arg(long)]
    pub check_only: bool,

    /// Directory holding, or to receive, the server [default: current directory].
    #[arg(short = 'd', long, value_name = "DIR")]
    pub install_dir: Option<Utf8PathBuf>,

    /// Override the vendor metadata URL.
    #[arg(long, value_name = "URL")]
    pub metadata_url: Option<String>,

    /// HTTP timeout in seconds [default: 30].
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors and the license prompt still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Arguments for the server itself, e.g. `inifile=ts3server.ini`.
    #[arg(skip)]
    pub server_args: Vec<String>,
}

impl Cli {
    /// Parse a full argument list, program name first.
    ///
    /// Only tokens naming an updater option (plus the value of an option
    /// that takes one) reach clap. Everything else, including unknown
    /// `--flags`, is kept in [`Cli::server_args`] in its original order.
    ///
    /// # Errors
    ///
    /// Returns the clap error for a malformed updater option, or the help
    /// and version "errors" clap uses to stop early.
    ///
    /// # Examples
    ///
    /// ```
    /// use ts3_updater::cli::Cli;
    ///
    /// let args = ["ts3-updater", "inifile=ts3server.ini", "--check-only"];
    /// let cli = Cli::try_parse_args(args.map(String::from)).expect("valid arguments");
    /// assert!(cli.check_only);
    /// assert_eq!(cli.server_args, ["inifile=ts3server.ini"]);
    /// ```
    pub fn try_parse_args(args: impl IntoIterator<Item = String>) -> Result<Self, clap::Error> {
        let mut tokens = args.into_iter();
        let program = tokens.next().unwrap_or_else(|| "ts3-updater".to_owned());
        let (updater, server) = OptionTable::from_command().split(tokens);
        let mut cli = Self::try_parse_from(std::iter::once(program).chain(updater))?;
        cli.server_args = server;
        Ok(cli)
    }

    /// Arguments for the server's start script: the update flags that were
    /// given, then the server arguments.
    ///
    /// Updater-only options such as `--install-dir` or `-v` are not passed on.
    #[must_use]
    pub fn start_args(&self) -> Vec<String> {
        [
            (self.dont_start, "--dont-start"),
            (self.accept_license, "--accept-license"),
            (self.check_only, "--check-only"),
        ]
        .into_iter()
        .filter(|(given, _)| *given)
        .map(|(_, flag)| flag.to_owned())
        .chain(self.server_args.iter().cloned())
        .collect()
    }
}

/// How a single token relates to the updater's own options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Server,
    Updater,
    UpdaterWithValue,
}

/// Option names known to clap, split by whether they take a value.
#[derive(Debug, Default)]
struct OptionTable {
    long_flags: Vec<String>,
    long_values: Vec<String>,
    short_flags: Vec<char>,
    short_values: Vec<char>,
}

impl OptionTable {
    fn from_command() -> Self {
        let mut command = Cli::command();
        command.build();
        let mut table = Self::default();
        for arg in command.get_arguments().filter(|arg| !arg.is_positional()) {
            let takes_value = arg.get_action().takes_values();
            if let Some(long) = arg.get_long() {
                let names = if takes_value {
                    &mut table.long_values
                } else {
                    &mut table.long_flags
                };
                names.push(long.to_owned());
            }
            if let Some(short) = arg.get_short() {
                let names = if takes_value {
                    &mut table.short_values
                } else {
                    &mut table.short_flags
                };
                names.push(short);
            }
        }
        table
    }

    fn split(&self, args: impl IntoIterator<Item = String>) -> (Vec<String>, Vec<String>) {
        let mut updater = Vec::new();
        let mut server = Vec::new();
        let mut tokens = args.into_iter();
        while let Some(token) = tokens.next() {
            match self.claim(&token) {
                Claim::Server => server.push(token),
                Claim::Updater => updater.push(token),
                Claim::UpdaterWithValue => {
                    updater.push(token);
                    updater.extend(tokens.next());
                }
            }
        }
        (updater, server)
    }

    fn claim(&self, token: &str) -> Claim {
        if let Some(long) = token.strip_prefix("--") {
            let (name, inline_value) = long
                .split_once('=')
                .map_or((long, false), |(name, _)| (name, true));
            if self.long_values.iter().any(|known| known == name) {
                return if inline_value {
                    Claim::Updater
                } else {
                    Claim::UpdaterWithValue
                };
            }
            if !inline_value && self.long_flags.iter().any(|known| known == name) {
                return Claim::Updater;
            }
            return Claim::Server;
        }

        let Some(shorts) = token.strip_prefix('-') else {
            return Claim::Server;
        };
        let mut chars = shorts.chars();
        let Some(first) = chars.next() else {
            return Claim::Server;
        };
        if self.short_values.contains(&first) {
            // `-d DIR` or `-dDIR`.
            return if chars.as_str().is_empty() {
                Claim::UpdaterWithValue
            } else {
                Claim::Updater
            };
        }
        if shorts.chars().all(|c| self.short_flags.contains(&c)) {
            Claim::Updater
        } else {
            Claim::Server
        }
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
#[path = "cli_tests.rs"]
mod tests;

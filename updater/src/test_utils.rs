//! Shared test utilities for the updater crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour tests under `tests/`.

#![expect(
    clippy::expect_used,
    reason = "fixture builders panic with a message instead of returning errors"
)]

use crate::deps::{CommandExecutor, ToolProbe};
use crate::download::{DownloadError, ReleaseDownloader};
use crate::error::{Result, UpdaterError};
use crate::platform::PlatformKey;
use crate::service::ServiceControl;
use crate::state::PID_FILE;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    output_with_stdout("")
}

/// Creates a successful command `Output` printing `stdout`.
pub fn output_with_stdout(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "sha256sum").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(UpdaterError::StubMismatch {
                message: format!("unexpected invocation of {cmd} {args:?}"),
            });
        };

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args, args);

        call.result
    }
}

/// Probe reporting a fixed set of tools as installed.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    available: Vec<String>,
}

impl StaticProbe {
    /// A probe for which exactly `tools` are on `PATH`.
    pub fn with(tools: &[&str]) -> Self {
        Self {
            available: tools.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ToolProbe for StaticProbe {
    fn is_available(&self, tool: &str) -> bool {
        self.available.iter().any(|candidate| candidate == tool)
    }
}

/// Downloader serving canned responses by URL.
///
/// URLs without a response fail. A failing archive download leaves a
/// partial file behind, the way an interrupted transfer would.
#[derive(Debug, Default)]
pub struct FakeDownloader {
    responses: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl FakeDownloader {
    /// A downloader with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    #[must_use]
    pub fn serving(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_owned(), body.into());
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn respond(&self, url: &str) -> Option<&Vec<u8>> {
        self.requests.borrow_mut().push(url.to_owned());
        self.responses.get(url)
    }
}

impl ReleaseDownloader for FakeDownloader {
    fn fetch_metadata(&self, url: &str) -> std::result::Result<String, DownloadError> {
        self.respond(url)
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .ok_or_else(|| DownloadError::NotFound {
                url: url.to_owned(),
            })
    }

    fn download_archive(&self, url: &str, dest: &Path) -> std::result::Result<(), DownloadError> {
        match self.respond(url) {
            Some(body) => {
                std::fs::write(dest, body)?;
                Ok(())
            }
            None => {
                std::fs::write(dest, b"partial")?;
                Err(DownloadError::HttpError {
                    url: url.to_owned(),
                    reason: "connection reset".to_owned(),
                })
            }
        }
    }
}

/// A call made to [`RecordingService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    /// `stop` in the given directory.
    Stop(PathBuf),
    /// `start` in the given directory with the given arguments.
    Start(PathBuf, Vec<String>),
}

/// Service controller that records calls and maintains the PID marker.
#[derive(Debug, Default)]
pub struct RecordingService {
    calls: RefCell<Vec<ServiceCall>>,
}

impl RecordingService {
    /// A controller with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.borrow().clone()
    }
}

impl ServiceControl for RecordingService {
    fn stop(&self, install_dir: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(ServiceCall::Stop(install_dir.to_path_buf()));
        match std::fs::remove_file(install_dir.join(PID_FILE)) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn start(&self, install_dir: &Path, args: &[String]) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(ServiceCall::Start(install_dir.to_path_buf(), args.to_vec()));
        std::fs::write(install_dir.join(PID_FILE), b"4242")?;
        Ok(())
    }
}

/// Computes the lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Builds a metadata document holding one release under `platform`'s key
/// path, with mirrors in the given order.
pub fn release_metadata_json(
    platform: &PlatformKey,
    version: &str,
    mirrors: &[(&str, &str)],
    checksum: &str,
) -> String {
    let mirror_map: Map<String, Value> = mirrors
        .iter()
        .map(|(name, url)| ((*name).to_owned(), Value::from(*url)))
        .collect();
    let mut release = Map::new();
    release.insert("version".to_owned(), Value::from(version));
    release.insert("checksum".to_owned(), Value::from(checksum));
    release.insert("mirrors".to_owned(), Value::Object(mirror_map));

    let document = platform
        .path()
        .iter()
        .rev()
        .fold(Value::Object(release), |inner, key| {
            let mut outer = Map::new();
            outer.insert((*key).to_owned(), inner);
            Value::Object(outer)
        });
    document.to_string()
}

/// Compression applied by [`build_release_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveCompression {
    /// `.tar.gz`
    Gzip,
    /// `.tar.bz2`, as the vendor ships.
    Bzip2,
    /// `.tar.zst`
    Zstd,
    /// Plain `.tar`.
    None,
}

/// Builds a release archive rooted at `top` holding `files`.
///
/// # Panics
///
/// Panics if the archive cannot be assembled.
pub fn release_archive_bytes(
    top: &str,
    files: &[(&str, &[u8])],
    compression: ArchiveCompression,
) -> Vec<u8> {
    let entries: Vec<_> = files
        .iter()
        .map(|&(name, content)| ArchiveEntry::File(name, content))
        .collect();
    compress(tar_stream(top, &entries), compression)
}

/// One entry below the top-level directory, for [`build_archive_with_entries`].
#[derive(Debug, Clone, Copy)]
pub enum ArchiveEntry<'a> {
    /// Regular file with its contents.
    File(&'a str, &'a [u8]),
    /// Symbolic link; the target is stored verbatim.
    Symlink(&'a str, &'a str),
    /// Hard link to another archive entry, named in full.
    HardLink(&'a str, &'a str),
}

fn tar_stream(top: &str, entries: &[ArchiveEntry<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut dir_header = tar::Header::new_gnu();
    dir_header.set_entry_type(tar::EntryType::Directory);
    dir_header.set_mode(0o755);
    dir_header.set_size(0);
    builder
        .append_data(&mut dir_header, format!("{top}/"), std::io::empty())
        .expect("append top-level directory");

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match *entry {
            ArchiveEntry::File(name, content) => {
                header.set_size(content.len() as u64);
                header.set_mode(if name.ends_with(".sh") { 0o755 } else { 0o644 });
                builder
                    .append_data(&mut header, format!("{top}/{name}"), content)
                    .expect("append file");
            }
            ArchiveEntry::Symlink(name, target) | ArchiveEntry::HardLink(name, target) => {
                let kind = if matches!(entry, ArchiveEntry::Symlink(..)) {
                    tar::EntryType::Symlink
                } else {
                    tar::EntryType::Link
                };
                header.set_entry_type(kind);
                header.set_mode(0o777);
                header.set_size(0);
                builder
                    .append_link(&mut header, format!("{top}/{name}"), target)
                    .expect("append link");
            }
        }
    }
    builder.into_inner().expect("finish tar stream")
}

fn compress(tar_bytes: Vec<u8>, compression: ArchiveCompression) -> Vec<u8> {
    match compression {
        ArchiveCompression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&tar_bytes).expect("gzip archive");
            encoder.finish().expect("finish gzip")
        }
        ArchiveCompression::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(&tar_bytes).expect("bzip2 archive");
            encoder.finish().expect("finish bzip2")
        }
        ArchiveCompression::Zstd => {
            zstd::encode_all(tar_bytes.as_slice(), 0).expect("zstd archive")
        }
        ArchiveCompression::None => tar_bytes,
    }
}

/// Writes a release archive rooted at `top` holding `files` to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be assembled or written.
pub fn build_release_archive(
    path: &Path,
    top: &str,
    files: &[(&str, &[u8])],
    compression: ArchiveCompression,
) {
    std::fs::write(path, release_archive_bytes(top, files, compression))
        .expect("write release archive");
}

/// Writes an uncompressed archive holding `entries` in order.
///
/// # Panics
///
/// Panics if the archive cannot be assembled or written.
pub fn build_archive_with_entries(path: &Path, top: &str, entries: &[ArchiveEntry<'_>]) {
    std::fs::write(path, tar_stream(top, entries)).expect("write release archive");
}

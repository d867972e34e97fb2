//! Archive checksum verification.
//!
//! The digest is computed with the [`ChecksumStrategy`] chosen at startup:
//! a system tool when one is installed, otherwise the linked `sha2`
//! implementation.

use crate::deps::CommandExecutor;
use crate::digest::Sha256Digest;
use crate::error::{Result, UpdaterError};
use log::debug;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// How a SHA-256 digest is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumStrategy {
    /// GNU coreutils `sha256sum <file>`.
    Sha256sum,
    /// Perl `shasum -a 256 <file>`.
    Shasum,
    /// BSD `sha256 -q <file>`.
    BsdSha256,
    /// In-process digest via `sha2`.
    Builtin,
}

impl ChecksumStrategy {
    /// The external program behind this strategy, if any.
    #[must_use]
    pub const fn program(self) -> Option<&'static str> {
        match self {
            Self::Sha256sum => Some("sha256sum"),
            Self::Shasum => Some("shasum"),
            Self::BsdSha256 => Some("sha256"),
            Self::Builtin => None,
        }
    }

    const fn leading_args(self) -> &'static [&'static str] {
        match self {
            Self::Shasum => &["-a", "256"],
            Self::BsdSha256 => &["-q"],
            Self::Sha256sum | Self::Builtin => &[],
        }
    }
}

impl fmt::Display for ChecksumStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program().unwrap_or("built-in sha2"))
    }
}

/// Compute the SHA-256 digest of `path` with `strategy`.
///
/// # Errors
///
/// Returns [`UpdaterError::ChecksumUnavailable`] if the file cannot be read,
/// the tool cannot be run or exits unsuccessfully, or its output is not a
/// digest.
pub fn compute_digest(
    strategy: ChecksumStrategy,
    executor: &dyn CommandExecutor,
    path: &Path,
) -> Result<Sha256Digest> {
    let Some(program) = strategy.program() else {
        return compute_builtin(path);
    };

    let path_arg = path.to_str().ok_or_else(|| UpdaterError::ChecksumUnavailable {
        reason: format!("path {} is not valid UTF-8", path.display()),
    })?;
    let mut args: Vec<&str> = strategy.leading_args().to_vec();
    args.push(path_arg);

    let output = executor
        .run(program, &args)
        .map_err(|e| UpdaterError::ChecksumUnavailable {
            reason: format!("{program} could not be run: {e}"),
        })?;
    if !output.status.success() {
        return Err(UpdaterError::ChecksumUnavailable {
            reason: format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let token = stdout.split_whitespace().next().unwrap_or_default();
    Sha256Digest::try_from(token).map_err(|e| UpdaterError::ChecksumUnavailable {
        reason: format!("{program} printed an unexpected digest: {e}"),
    })
}

fn compute_builtin(path: &Path) -> Result<Sha256Digest> {
    let unavailable = |e: std::io::Error| UpdaterError::ChecksumUnavailable {
        reason: format!("could not read {}: {e}", path.display()),
    };
    let mut file = std::fs::File::open(path).map_err(unavailable)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(unavailable)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    let hex = format!("{:x}", hasher.finalize());
    Sha256Digest::try_from(hex).map_err(|e| UpdaterError::ChecksumUnavailable {
        reason: e.to_string(),
    })
}

/// Verify that `path` hashes to `expected`.
///
/// # Errors
///
/// Returns [`UpdaterError::ChecksumMismatch`] when the digests differ, or
/// the error of [`compute_digest`] when no digest could be computed.
pub fn verify_archive(
    strategy: ChecksumStrategy,
    executor: &dyn CommandExecutor,
    path: &Path,
    expected: &Sha256Digest,
) -> Result<()> {
    let actual = compute_digest(strategy, executor, path)?;
    debug!("archive digest via {strategy}: {actual}");
    if &actual != expected {
        return Err(UpdaterError::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;
    use crate::deps::SystemCommandExecutor;
    use crate::error::ErrorKind;
    use crate::test_utils::{
        ExpectedCall, StubExecutor, failure_output, output_with_stdout, sha256_hex,
    };
    use rstest::rstest;

    const CONTENT: &[u8] = b"teamspeak server archive";

    fn archive() -> (tempfile::TempDir, std::path::PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("server.tar");
        std::fs::write(&path, CONTENT).expect("write archive");
        (temp, path)
    }

    #[test]
    fn builtin_digest_matches_known_value() {
        let (_temp, path) = archive();
        let digest = compute_digest(ChecksumStrategy::Builtin, &SystemCommandExecutor, &path)
            .expect("digest");
        assert_eq!(digest.as_str(), sha256_hex(CONTENT));
    }

    #[test]
    fn builtin_digest_of_missing_file_is_unavailable() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = compute_digest(
            ChecksumStrategy::Builtin,
            &SystemCommandExecutor,
            &temp.path().join("absent.tar"),
        )
        .expect_err("missing file");
        assert!(matches!(err, UpdaterError::ChecksumUnavailable { .. }));
    }

    #[rstest]
    #[case::gnu(ChecksumStrategy::Sha256sum, "sha256sum", &[], "  server.tar")]
    #[case::perl(ChecksumStrategy::Shasum, "shasum", &["-a", "256"], "  server.tar")]
    #[case::bsd(ChecksumStrategy::BsdSha256, "sha256", &["-q"], "")]
    fn external_tool_output_is_parsed(
        #[case] strategy: ChecksumStrategy,
        #[case] program: &'static str,
        #[case] leading: &'static [&'static str],
        #[case] suffix: &str,
    ) {
        let (_temp, path) = archive();
        let hex = sha256_hex(CONTENT);
        let mut args: Vec<String> = leading.iter().map(ToString::to_string).collect();
        args.push(path.display().to_string());
        let executor = StubExecutor::new(vec![ExpectedCall {
            cmd: program,
            args,
            result: Ok(output_with_stdout(&format!("{hex}{suffix}\n"))),
        }]);

        let digest = compute_digest(strategy, &executor, &path).expect("digest");
        assert_eq!(digest.as_str(), hex);
        executor.assert_finished();
    }

    #[test]
    fn failing_tool_is_unavailable() {
        let (_temp, path) = archive();
        let executor = StubExecutor::new(vec![ExpectedCall {
            cmd: "sha256sum",
            args: vec![path.display().to_string()],
            result: Ok(failure_output("sha256sum: server.tar: Permission denied")),
        }]);

        let err = compute_digest(ChecksumStrategy::Sha256sum, &executor, &path)
            .expect_err("tool fails");
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
        assert!(err.to_string().contains("Permission denied"));
    }

    #[test]
    fn mismatch_reports_both_digests() {
        let (_temp, path) = archive();
        let expected = Sha256Digest::try_from("0".repeat(64)).expect("valid digest");

        let err = verify_archive(
            ChecksumStrategy::Builtin,
            &SystemCommandExecutor,
            &path,
            &expected,
        )
        .expect_err("digest differs");
        match err {
            UpdaterError::ChecksumMismatch { expected, actual } => {
                assert_eq!(expected, "0".repeat(64));
                assert_eq!(actual, sha256_hex(CONTENT));
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
    }

    #[test]
    fn matching_digest_verifies_case_insensitively() {
        let (_temp, path) = archive();
        let expected =
            Sha256Digest::try_from(sha256_hex(CONTENT).to_uppercase()).expect("valid digest");
        verify_archive(
            ChecksumStrategy::Builtin,
            &SystemCommandExecutor,
            &path,
            &expected,
        )
        .expect("digest matches");
    }

    #[test]
    fn display_names_program_or_builtin() {
        assert_eq!(ChecksumStrategy::Shasum.to_string(), "shasum");
        assert_eq!(ChecksumStrategy::Builtin.to_string(), "built-in sha2");
    }
}

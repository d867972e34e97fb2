//! Metadata and archive retrieval.
//!
//! Provides a trait-based abstraction over the two HTTP requests an update
//! needs, so tests can drive the pipeline without network access, and the
//! mirror fallback loop built on top of it.

use crate::error::{Result, UpdaterError};
use crate::metadata::Mirror;
use log::{debug, info, warn};
use std::path::Path;
use std::time::Duration;

/// Vendor endpoint describing the current server releases.
pub const DEFAULT_METADATA_URL: &str = "https://www.teamspeak.com/versions/server.json";

/// Default network timeout for each request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for fetching the metadata document and release archives.
///
/// # Examples
///
/// ```
/// use ts3_updater::download::{DEFAULT_TIMEOUT, HttpDownloader};
///
/// let downloader = HttpDownloader::new(DEFAULT_TIMEOUT);
/// // Use downloader.fetch_metadata(url) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseDownloader {
    /// Fetch the metadata document at `url` as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not text.
    fn fetch_metadata(&self, url: &str) -> std::result::Result<String, DownloadError>;

    /// Download the archive at `url` into `dest`, following redirects.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the file write fails.
    fn download_archive(&self, url: &str, dest: &Path) -> std::result::Result<(), DownloadError>;
}

/// Errors arising from a single HTTP request.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered 404.
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
///
/// `ureq` follows redirects by default, which the vendor mirrors rely on.
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl ReleaseDownloader for HttpDownloader {
    fn fetch_metadata(&self, url: &str) -> std::result::Result<String, DownloadError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn download_archive(&self, url: &str, dest: &Path) -> std::result::Result<(), DownloadError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Try each mirror in order and stop at the first that yields a non-empty
/// archive at `dest`.
///
/// Each mirror is tried once. A failed attempt removes whatever partial file
/// it left behind, so a later mirror always starts from scratch.
///
/// # Errors
///
/// Returns [`UpdaterError::MirrorsExhausted`] listing every attempt when no
/// mirror produced a file.
pub fn download_from_mirrors<'m>(
    downloader: &dyn ReleaseDownloader,
    mirrors: &'m [Mirror],
    dest: &Path,
) -> Result<&'m Mirror> {
    let mut attempts = Vec::new();

    for mirror in mirrors {
        debug!("trying mirror {} at {}", mirror.name, mirror.url);
        let reason = match downloader.download_archive(&mirror.url, dest) {
            Ok(()) if is_non_empty_file(dest) => {
                info!("downloaded archive from mirror {}", mirror.name);
                return Ok(mirror);
            }
            Ok(()) => "mirror returned an empty body".to_owned(),
            Err(err) => err.to_string(),
        };

        warn!("mirror {} failed: {reason}", mirror.name);
        discard_partial(dest);
        attempts.push((mirror.name.clone(), reason));
    }

    Err(UpdaterError::MirrorsExhausted { attempts })
}

fn is_non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
            warn!("could not remove partial download {}: {err}", path.display());
        }
        _ => {}
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockall::Sequence;

    fn mirrors(names: &[&str]) -> Vec<Mirror> {
        names
            .iter()
            .map(|name| Mirror {
                name: (*name).to_owned(),
                url: format!("https://{name}.test/server.tar.bz2"),
            })
            .collect()
    }

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/server.json", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http_error() {
        let err = ureq::Error::StatusCode(500);
        let mapped = map_ureq_error("https://example.test/server.json", &err);
        assert!(matches!(mapped, DownloadError::HttpError { .. }));
    }

    #[test]
    fn falls_back_to_second_mirror() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dest = temp.path().join("server.tar");
        let list = mirrors(&["m1", "m2"]);

        let mut downloader = MockReleaseDownloader::new();
        let mut seq = Sequence::new();
        downloader
            .expect_download_archive()
            .withf(|url, _| url.contains("m1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|url, dest| {
                std::fs::write(dest, b"partial").map_err(DownloadError::Io)?;
                Err(DownloadError::HttpError {
                    url: url.to_owned(),
                    reason: "connection reset".to_owned(),
                })
            });
        downloader
            .expect_download_archive()
            .withf(|url, _| url.contains("m2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, dest| std::fs::write(dest, b"from m2").map_err(DownloadError::Io));

        let used = download_from_mirrors(&downloader, &list, &dest).expect("m2 succeeds");
        assert_eq!(used.name, "m2");
        assert_eq!(std::fs::read(&dest).expect("archive"), b"from m2");
    }

    #[test]
    fn stops_at_first_success() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dest = temp.path().join("server.tar");
        let list = mirrors(&["m1", "m2"]);

        let mut downloader = MockReleaseDownloader::new();
        downloader
            .expect_download_archive()
            .times(1)
            .returning(|_, dest| std::fs::write(dest, b"ok").map_err(DownloadError::Io));

        let used = download_from_mirrors(&downloader, &list, &dest).expect("m1 succeeds");
        assert_eq!(used.name, "m1");
    }

    #[test]
    fn empty_body_counts_as_failure() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dest = temp.path().join("server.tar");
        let list = mirrors(&["m1"]);

        let mut downloader = MockReleaseDownloader::new();
        downloader
            .expect_download_archive()
            .returning(|_, dest| std::fs::write(dest, b"").map_err(DownloadError::Io));

        let err = download_from_mirrors(&downloader, &list, &dest).expect_err("empty body");
        assert!(err.to_string().contains("empty body"));
        assert!(!dest.exists());
    }

    #[test]
    fn all_mirrors_failing_is_fatal() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dest = temp.path().join("server.tar");
        let list = mirrors(&["m1", "m2"]);

        let mut downloader = MockReleaseDownloader::new();
        downloader
            .expect_download_archive()
            .times(2)
            .returning(|url, _| {
                Err(DownloadError::NotFound {
                    url: url.to_owned(),
                })
            });

        let err = download_from_mirrors(&downloader, &list, &dest).expect_err("no mirror works");
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);
        match err {
            UpdaterError::MirrorsExhausted { attempts } => assert_eq!(attempts.len(), 2),
            other => panic!("expected MirrorsExhausted, got {other:?}"),
        }
    }
}

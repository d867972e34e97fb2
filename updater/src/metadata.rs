//! Server metadata document parsing.
//!
//! The vendor publishes a JSON document keyed by platform:
//!
//! ```json
//! {
//!   "linux": {
//!     "x86_64": {
//!       "version": "3.13.7",
//!       "mirrors": { "teamspeak.com": "https://files.teamspeak-services.com/..." },
//!       "checksum": "775a5731..."
//!     }
//!   }
//! }
//! ```
//!
//! [`parse_release`] narrows the document to one [`PlatformKey`] and
//! validates the entry. Mirror order follows the document.

use crate::digest::{DigestError, Sha256Digest};
use crate::platform::PlatformKey;
use serde::Deserialize;
use serde_json::Value;

/// A named download location for the server archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    /// Display name of the mirror, as keyed in the document.
    pub name: String,
    /// Archive URL.
    pub url: String,
}

/// The release the vendor currently publishes for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRelease {
    version: String,
    mirrors: Vec<Mirror>,
    checksum: Sha256Digest,
}

impl ServerRelease {
    /// The published version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Mirrors in the order the document lists them.
    #[must_use]
    pub fn mirrors(&self) -> &[Mirror] {
        &self.mirrors
    }

    /// The published archive digest.
    #[must_use]
    pub fn checksum(&self) -> &Sha256Digest {
        &self.checksum
    }
}

/// Errors arising from an unusable metadata document.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The body is not JSON.
    #[error("metadata is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The document has no entry for the platform.
    #[error("no release published for platform {platform}")]
    MissingPlatform {
        /// Dotted key path that was looked up.
        platform: String,
    },

    /// The platform entry does not match the expected schema.
    #[error("release entry for {platform} is malformed: {reason}")]
    InvalidEntry {
        /// Dotted key path of the entry.
        platform: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The published checksum is not a SHA-256 digest.
    #[error("release entry for {platform} has an unusable checksum: {source}")]
    InvalidChecksum {
        /// Dotted key path of the entry.
        platform: String,
        /// Validation failure.
        #[source]
        source: DigestError,
    },
}

#[derive(Deserialize)]
struct RawRelease {
    version: String,
    mirrors: serde_json::Map<String, Value>,
    checksum: String,
}

/// Parse the metadata document and select the release for `platform`.
///
/// # Errors
///
/// Returns [`MetadataError`] when the body is not JSON, the platform key
/// path is absent, or the entry is missing a field, lists no mirrors, or
/// carries a malformed checksum.
///
/// # Examples
///
/// ```
/// use ts3_updater::metadata::parse_release;
/// use ts3_updater::platform::PlatformKey;
///
/// let json = format!(
///     r#"{{"macos": {{"version": "3.13.7", "mirrors": {{"a": "https://a.test/s.tar.bz2"}}, "checksum": "{}"}}}}"#,
///     "0".repeat(64)
/// );
/// let key = PlatformKey::resolve("macos", "aarch64").expect("supported");
/// let release = parse_release(&json, &key).expect("valid metadata");
/// assert_eq!(release.version(), "3.13.7");
/// ```
pub fn parse_release(json: &str, platform: &PlatformKey) -> Result<ServerRelease, MetadataError> {
    let document: Value = serde_json::from_str(json)?;
    let platform_name = platform.to_string();

    let entry = platform
        .path()
        .into_iter()
        .try_fold(&document, |node, key| node.get(key))
        .ok_or_else(|| MetadataError::MissingPlatform {
            platform: platform_name.clone(),
        })?;

    let raw = RawRelease::deserialize(entry).map_err(|e| MetadataError::InvalidEntry {
        platform: platform_name.clone(),
        reason: e.to_string(),
    })?;

    let mirrors = collect_mirrors(raw.mirrors, &platform_name)?;
    let checksum =
        Sha256Digest::try_from(raw.checksum).map_err(|source| MetadataError::InvalidChecksum {
            platform: platform_name.clone(),
            source,
        })?;

    if raw.version.trim().is_empty() {
        return Err(MetadataError::InvalidEntry {
            platform: platform_name,
            reason: "empty version".to_owned(),
        });
    }

    Ok(ServerRelease {
        version: raw.version.trim().to_owned(),
        mirrors,
        checksum,
    })
}

fn collect_mirrors(
    raw: serde_json::Map<String, Value>,
    platform: &str,
) -> Result<Vec<Mirror>, MetadataError> {
    let mut mirrors = Vec::with_capacity(raw.len());
    for (name, value) in raw {
        let Value::String(url) = value else {
            return Err(MetadataError::InvalidEntry {
                platform: platform.to_owned(),
                reason: format!("mirror {name} is not a URL string"),
            });
        };
        mirrors.push(Mirror { name, url });
    }

    if mirrors.is_empty() {
        return Err(MetadataError::InvalidEntry {
            platform: platform.to_owned(),
            reason: "no mirrors listed".to_owned(),
        });
    }
    Ok(mirrors)
}

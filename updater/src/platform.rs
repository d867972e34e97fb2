//! Platform resolution for the server metadata document.
//!
//! The vendor publishes one metadata entry per operating system, and on every
//! system except macOS one entry per architecture beneath it. A
//! [`PlatformKey`] is the path of object keys that selects the entry for the
//! running host.

use crate::error::{Result, UpdaterError};
use std::fmt;

/// Operating systems the vendor ships a server build for.
const SUPPORTED_OS: &[&str] = &["linux", "freebsd", "macos"];

/// Architecture key for 64-bit x86 builds.
const ARCH_64: &str = "x86_64";

/// Architecture key for every other build.
const ARCH_GENERIC: &str = "x86";

/// Operating system and CPU architecture of a machine, as named by
/// [`std::env::consts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Operating system, e.g. `linux`.
    pub os: String,
    /// CPU architecture, e.g. `x86_64`.
    pub arch: String,
}

impl Host {
    /// The host this binary runs on.
    #[must_use]
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// A host with the given operating system and architecture.
    #[must_use]
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_owned(),
            arch: arch.to_owned(),
        }
    }
}

/// The metadata key path for one platform.
///
/// # Examples
///
/// ```
/// use ts3_updater::platform::PlatformKey;
///
/// let key = PlatformKey::resolve("linux", "x86_64").expect("supported platform");
/// assert_eq!(key.path(), ["linux", "x86_64"]);
///
/// let mac = PlatformKey::resolve("macos", "aarch64").expect("supported platform");
/// assert_eq!(mac.path(), ["macos"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    os: &'static str,
    arch: Option<&'static str>,
}

impl PlatformKey {
    /// Resolve the key for `host`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::PlatformUnsupported`] when the host operating
    /// system has no server build.
    pub fn for_host(host: &Host) -> Result<Self> {
        Self::resolve(&host.os, &host.arch)
    }

    /// Resolve the key for an operating system and CPU architecture, as
    /// named by [`std::env::consts`].
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::PlatformUnsupported`] for any operating system
    /// outside `linux`, `freebsd` and `macos`.
    pub fn resolve(os: &str, arch: &str) -> Result<Self> {
        let Some(os_key) = SUPPORTED_OS.iter().copied().find(|key| *key == os) else {
            return Err(UpdaterError::PlatformUnsupported { os: os.to_owned() });
        };

        if os_key == "macos" {
            return Ok(Self {
                os: os_key,
                arch: None,
            });
        }

        let arch_key = if arch == "x86_64" {
            ARCH_64
        } else {
            ARCH_GENERIC
        };
        Ok(Self {
            os: os_key,
            arch: Some(arch_key),
        })
    }

    /// The top-level metadata key.
    #[must_use]
    pub const fn os(&self) -> &'static str {
        self.os
    }

    /// The architecture key, absent on macOS.
    #[must_use]
    pub const fn arch(&self) -> Option<&'static str> {
        self.arch
    }

    /// The full key path into the metadata document.
    #[must_use]
    pub fn path(&self) -> Vec<&'static str> {
        std::iter::once(self.os).chain(self.arch).collect()
    }

    /// Return the supported operating system keys.
    #[must_use]
    pub fn supported() -> &'static [&'static str] {
        SUPPORTED_OS
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().join("."))
    }
}

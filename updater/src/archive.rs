//! Release archive inspection and extraction.
//!
//! The vendor ships the server as a compressed tar archive rooted at a single
//! top-level directory. This module sniffs the compression from the file's
//! magic bytes, finds the top-level directory, reads the bundled `LICENSE`,
//! and extracts with the top-level directory stripped. Every entry path and
//! link target is validated, and no entry is written through a symlink that
//! leads out of the destination, so nothing lands outside it.

use log::debug;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::EntryType;

/// Name of the license file at the archive root.
pub const LICENSE_FILE: &str = "LICENSE";

/// Trait for reading and extracting release archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use ts3_updater::archive::TarExtractor;
///
/// let extractor = TarExtractor;
/// // Use extractor.extract_stripped(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Return the name of the archive's top-level directory.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::NoTopLevelDir`] when no entry sits below a
    /// directory, or an I/O error when the archive cannot be read.
    fn top_level_dir(&self, archive_path: &Path) -> Result<String, ExtractionError>;

    /// Return the text of `<top_level>/LICENSE` without extracting anything.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::MissingLicense`] when the file is absent.
    fn read_license(&self, archive_path: &Path, top_level: &str)
    -> Result<String, ExtractionError>;

    /// Extract every entry into `dest_dir`, dropping the first path component.
    ///
    /// Existing files are overwritten. Returns the relative paths written.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::EmptyArchive`]
    /// if nothing was extracted, or [`ExtractionError::Io`] on I/O failures.
    fn extract_stripped(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Errors arising from archive inspection or extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// No entry is nested below a top-level directory.
    #[error("archive has no top-level directory")]
    NoTopLevelDir,

    /// The archive has no license file at its root.
    #[error("archive has no {top_level}/LICENSE")]
    MissingLicense {
        /// The top-level directory that was searched.
        top_level: String,
    },

    /// The archive contains no files below its top-level directory.
    #[error("archive contains no server files")]
    EmptyArchive,
}

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// gzip (`1f 8b`).
    Gzip,
    /// bzip2 (`BZh`).
    Bzip2,
    /// Zstandard (`28 b5 2f fd`).
    Zstd,
    /// No compression.
    None,
}

impl Compression {
    /// Identify the compression from the first bytes of a file.
    ///
    /// # Examples
    ///
    /// ```
    /// use ts3_updater::archive::Compression;
    ///
    /// assert_eq!(Compression::sniff(b"BZh91AY&SY"), Compression::Bzip2);
    /// assert_eq!(Compression::sniff(b"ustar"), Compression::None);
    /// ```
    #[must_use]
    pub fn sniff(header: &[u8]) -> Self {
        if header.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if header.starts_with(b"BZh") {
            Self::Bzip2
        } else if header.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }
}

/// Default extractor using the `tar` crate over `flate2`, `bzip2` or `zstd`.
pub struct TarExtractor;

impl TarExtractor {
    fn open(archive_path: &Path) -> Result<tar::Archive<Box<dyn Read>>, ExtractionError> {
        let mut header = [0u8; 4];
        let read = {
            let mut probe = File::open(archive_path)?;
            read_prefix(&mut probe, &mut header)?
        };
        let compression = Compression::sniff(header.get(..read).unwrap_or_default());
        debug!("{} is {compression:?}-compressed", archive_path.display());

        let file = BufReader::new(File::open(archive_path)?);
        let reader: Box<dyn Read> = match compression {
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
            Compression::Zstd => Box::new(zstd::Decoder::new(file)?),
            Compression::None => Box::new(file),
        };
        Ok(tar::Archive::new(reader))
    }
}

impl ArchiveExtractor for TarExtractor {
    fn top_level_dir(&self, archive_path: &Path) -> Result<String, ExtractionError> {
        let mut archive = Self::open(archive_path)?;
        for entry_result in archive.entries()? {
            let entry = entry_result?;
            let entry_path = entry.path()?.into_owned();
            if let Some(top) = top_level_of(&entry_path) {
                return Ok(top);
            }
        }
        Err(ExtractionError::NoTopLevelDir)
    }

    fn read_license(
        &self,
        archive_path: &Path,
        top_level: &str,
    ) -> Result<String, ExtractionError> {
        let wanted = Path::new(top_level).join(LICENSE_FILE);
        let mut archive = Self::open(archive_path)?;
        for entry_result in archive.entries()? {
            let mut entry = entry_result?;
            if normalised(&entry.path()?) == wanted {
                let mut text = String::new();
                entry.read_to_string(&mut text)?;
                return Ok(text);
            }
        }
        Err(ExtractionError::MissingLicense {
            top_level: top_level.to_owned(),
        })
    }

    fn extract_stripped(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let mut archive = Self::open(archive_path)?;
        archive.set_overwrite(true);
        std::fs::create_dir_all(dest_dir)?;
        let root = dest_dir.canonicalize()?;
        let mut extracted = Vec::new();

        for entry_result in archive.entries()? {
            let mut entry = entry_result?;
            let entry_path = entry.path()?.into_owned();

            validate_entry_path(&entry_path)?;
            let Some(relative) = strip_first_component(&entry_path) else {
                continue;
            };

            ensure_contained(&root, &relative)?;
            let dest_path = root.join(&relative);
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            match entry.header().entry_type() {
                EntryType::Symlink => {
                    let target = link_target(&entry, &entry_path)?;
                    validate_symlink_target(&relative, &target)?;
                    entry.unpack(&dest_path)?;
                }
                EntryType::Link => {
                    // Hard link targets name another archive entry.
                    let target = link_target(&entry, &entry_path)?;
                    validate_entry_path(&target)?;
                    let source = strip_first_component(&target)
                        .ok_or_else(|| traversal(&target))?;
                    ensure_contained(&root, &source)?;
                    remove_non_dir(&dest_path)?;
                    std::fs::hard_link(root.join(source), &dest_path)?;
                }
                _ => {
                    entry.unpack(&dest_path)?;
                }
            }
            extracted.push(relative);
        }

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }
        debug!(
            "extracted {} entries into {}",
            extracted.len(),
            dest_dir.display()
        );
        Ok(extracted)
    }
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while let Some(rest) = buf.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }
        let n = reader.read(rest)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Drop `.` components so `./dir/file` and `dir/file` compare equal.
fn normalised(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// The first segment of a path that has at least one separator after it.
fn top_level_of(path: &Path) -> Option<String> {
    let normal = normalised(path);
    let mut components = normal.iter();
    let first = components.next()?;
    components.next()?;
    Some(first.to_string_lossy().into_owned())
}

/// Path with the first component removed, or `None` for the top-level
/// directory entry itself.
fn strip_first_component(path: &Path) -> Option<PathBuf> {
    let normal = normalised(path);
    let mut components = normal.components();
    components.next()?;
    let rest = components.as_path();
    if rest.as_os_str().is_empty() {
        None
    } else {
        Some(rest.to_path_buf())
    }
}

fn traversal(path: &Path) -> ExtractionError {
    ExtractionError::PathTraversal {
        path: path.display().to_string(),
    }
}

fn link_target<R: Read>(
    entry: &tar::Entry<'_, R>,
    entry_path: &Path,
) -> Result<PathBuf, ExtractionError> {
    entry
        .link_name()?
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| traversal(entry_path))
}

/// Refuse entries whose parent directories pass through a symlink that
/// resolves outside `root`. `root` must already be canonical.
fn ensure_contained(root: &Path, relative: &Path) -> Result<(), ExtractionError> {
    let mut current = root.to_path_buf();
    for component in relative.parent().into_iter().flat_map(Path::components) {
        current.push(component);
        let metadata = match std::fs::symlink_metadata(&current) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if metadata.file_type().is_symlink() && !current.canonicalize()?.starts_with(root) {
            return Err(traversal(relative));
        }
    }
    Ok(())
}

/// A symlink at `relative` may point anywhere below the destination, but
/// never at an absolute path or above the destination via `..`.
fn validate_symlink_target(relative: &Path, target: &Path) -> Result<(), ExtractionError> {
    let mut depth = relative.parent().map_or(0, |parent| parent.components().count());
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(|| traversal(target))?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal(target)),
        }
    }
    Ok(())
}

/// Clear a file or link left by an earlier install so a hard link can
/// replace it.
fn remove_non_dir(path: &Path) -> Result<(), ExtractionError> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if !metadata.is_dir() => std::fs::remove_file(path)?,
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(traversal(path));
    }
    Ok(())
}

// src/extract.rs

//! Archive extraction into a staging tree
//!
//! The downloaded file name picks the strategy by longest matching suffix:
//!
//! | Suffix | Strategy |
//! |---|---|
//! | `.tar.gz`, `.tgz` | gzip-compressed tar |
//! | `.tar.xz`, `.txz` | xz-compressed tar |
//! | *(no extension)* | opaque pre-built file, copied as-is |
//!
//! Anything else with an extension is rejected. Only directories and regular
//! files are materialized; symlinks, hard links and device nodes are skipped
//! with a warning, so content reachable only through a symlink inside an
//! archive does not appear in the staging tree.

use crate::error::{Error, Result};
use crate::path::sanitize_path;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use tar::{Archive, EntryType};
use tracing::{debug, warn};

/// How a downloaded file is turned into a staging tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Tar container inside a gzip stream
    GzipTar,
    /// Tar container inside an xz/LZMA stream
    XzTar,
    /// Pre-built file placed into the tree unmodified
    Opaque,
}

impl ArchiveKind {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::GzipTar => "gzip-tar",
            Self::XzTar => "xz-tar",
            Self::Opaque => "opaque",
        }
    }

    /// Whether this kind goes through tar extraction
    pub fn is_archive(&self) -> bool {
        !matches!(self, Self::Opaque)
    }

    /// Classify a file name by its suffix
    pub fn from_file_name(name: &str) -> Result<Self> {
        let matched = SUFFIXES
            .iter()
            .filter(|(suffix, _)| name.ends_with(suffix))
            .max_by_key(|(suffix, _)| suffix.len());

        if let Some((_, kind)) = matched {
            return Ok(*kind);
        }

        match Path::new(name).extension() {
            Some(ext) if !ext.is_empty() => Err(Error::UnknownFormat(name.to_string())),
            _ => Ok(Self::Opaque),
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Recognized suffixes, matched longest first
const SUFFIXES: &[(&str, ArchiveKind)] = &[
    (".tar.gz", ArchiveKind::GzipTar),
    (".tgz", ArchiveKind::GzipTar),
    (".tar.xz", ArchiveKind::XzTar),
    (".txz", ArchiveKind::XzTar),
];

/// What an extraction produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub directories: usize,
    pub files: usize,
    /// Entries of unsupported types that were left out
    pub skipped: usize,
}

/// Unpack `archive` into `dest`, dispatching on its file name
pub fn extract(archive: &Path, dest: &Path) -> Result<ExtractReport> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", archive.display())))?;
    let kind = ArchiveKind::from_file_name(&name)?;
    extract_as(archive, dest, kind)
}

/// Unpack `archive` into `dest` with an explicit strategy
pub fn extract_as(archive: &Path, dest: &Path, kind: ArchiveKind) -> Result<ExtractReport> {
    debug!("Extracting {} ({}) into {}", archive.display(), kind, dest.display());
    fs::create_dir_all(dest)?;

    match kind {
        ArchiveKind::Opaque => place_opaque(archive, dest),
        ArchiveKind::GzipTar | ArchiveKind::XzTar => {
            let file = File::open(archive).map_err(|e| {
                Error::IoError(format!("Failed to open {}: {e}", archive.display()))
            })?;
            let reader = BufReader::new(file);
            let decoder: Box<dyn Read> = match kind {
                ArchiveKind::GzipTar => Box::new(flate2::read::GzDecoder::new(reader)),
                _ => Box::new(xz2::read::XzDecoder::new(reader)),
            };
            unpack_tar(decoder, dest).map_err(|e| match e {
                Error::Io(io_err) => Error::ExtractionError(format!(
                    "{} ({}): {}",
                    archive.display(),
                    kind,
                    io_err
                )),
                other => other,
            })
        }
    }
}

fn place_opaque(file: &Path, dest: &Path) -> Result<ExtractReport> {
    let name = file
        .file_name()
        .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", file.display())))?;
    fs::copy(file, dest.join(name)).map_err(|e| {
        Error::IoError(format!("Failed to copy {} into staging: {e}", file.display()))
    })?;
    Ok(ExtractReport {
        files: 1,
        ..Default::default()
    })
}

/// Read tar entries sequentially from a decompressed stream
///
/// IO failures surface as [`Error::Io`]; the caller attaches the archive name.
fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<ExtractReport> {
    let mut archive = Archive::new(reader);
    let mut report = ExtractReport::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_path = entry.path()?.into_owned();
        let entry_type = entry.header().entry_type();

        match entry_type {
            EntryType::Directory => {
                // Archives often carry a "./" root entry
                let relative = match sanitize_path(&raw_path) {
                    Ok(relative) => relative,
                    Err(Error::InvalidPath(_)) => continue,
                    Err(e) => return Err(e),
                };
                fs::create_dir_all(dest.join(relative))?;
                report.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                let target = dest.join(sanitize_path(&raw_path)?);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)?;
                io::copy(&mut entry, &mut out)?;
                report.files += 1;
            }
            other => {
                warn!("Skipping {} (unsupported entry type {:?})", raw_path.display(), other);
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tar::{Builder, Header};
    use tempfile::TempDir;

    fn dir_header() -> Header {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        header
    }

    fn file_header(len: usize) -> Header {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(len as u64);
        header.set_mode(0o644);
        header.set_cksum();
        header
    }

    fn sample_tar<W: Write>(writer: W) -> W {
        let mut builder = Builder::new(writer);
        builder
            .append_data(&mut dir_header(), "pkg/", io::empty())
            .unwrap();
        let body = b"#!/bin/sh\necho hi\n";
        builder
            .append_data(&mut file_header(body.len()), "pkg/bin/tool", &body[..])
            .unwrap();

        let mut link = Header::new_gnu();
        link.set_entry_type(EntryType::Symlink);
        link.set_size(0);
        link.set_cksum();
        builder
            .append_link(&mut link, "pkg/bin/tool-link", "tool")
            .unwrap();
        builder.into_inner().unwrap()
    }

    fn write_tar_gz(path: &Path) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        sample_tar(encoder).finish().unwrap();
    }

    fn write_tar_xz(path: &Path) {
        let encoder = xz2::write::XzEncoder::new(File::create(path).unwrap(), 6);
        sample_tar(encoder).finish().unwrap();
    }

    #[test]
    fn test_classify_suffixes() {
        assert_eq!(ArchiveKind::from_file_name("a.tar.gz").unwrap(), ArchiveKind::GzipTar);
        assert_eq!(ArchiveKind::from_file_name("a.tgz").unwrap(), ArchiveKind::GzipTar);
        assert_eq!(ArchiveKind::from_file_name("a.tar.xz").unwrap(), ArchiveKind::XzTar);
        assert_eq!(ArchiveKind::from_file_name("a.txz").unwrap(), ArchiveKind::XzTar);
        assert_eq!(ArchiveKind::from_file_name("kubectl").unwrap(), ArchiveKind::Opaque);
    }

    #[test]
    fn test_classify_unknown_extension() {
        assert!(matches!(
            ArchiveKind::from_file_name("app.zip"),
            Err(Error::UnknownFormat(_))
        ));
        assert!(matches!(
            ArchiveKind::from_file_name("app.tar.bz2"),
            Err(Error::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_extract_tar_gz_layout() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("app.tar.gz");
        write_tar_gz(&archive);

        let dest = temp.path().join("out");
        let report = extract(&archive, &dest).unwrap();

        assert_eq!(report.directories, 1);
        assert_eq!(report.files, 1);
        assert_eq!(report.skipped, 1);
        assert!(dest.join("pkg").is_dir());
        assert_eq!(
            fs::read(dest.join("pkg/bin/tool")).unwrap(),
            b"#!/bin/sh\necho hi\n"
        );
        assert!(!dest.join("pkg/bin/tool-link").exists());
    }

    #[test]
    fn test_extract_tar_xz_layout() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("app.txz");
        write_tar_xz(&archive);

        let dest = temp.path().join("out");
        let report = extract(&archive, &dest).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(
            fs::read(dest.join("pkg/bin/tool")).unwrap(),
            b"#!/bin/sh\necho hi\n"
        );
    }

    #[test]
    fn test_extract_opaque_copies_file() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("kubectl");
        fs::write(&binary, b"\x7fELF").unwrap();

        let dest = temp.path().join("out");
        let report = extract(&binary, &dest).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(fs::read(dest.join("kubectl")).unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::ExtractionError(_)), "got {err:?}");
    }

    #[test]
    fn test_unknown_format_not_extracted() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("app.zip");
        fs::write(&archive, b"PK").unwrap();

        let dest = temp.path().join("out");
        assert!(matches!(extract(&archive, &dest), Err(Error::UnknownFormat(_))));
        assert!(!dest.exists());
    }
}

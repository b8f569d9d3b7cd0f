// src/path.rs

//! Path sanitization for staging trees
//!
//! Tar entry names and configured destinations come from upstream archives
//! and hand-written YAML. Both are reduced to plain relative paths before
//! being joined onto a staging root, so nothing lands outside it.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Reduce an untrusted path to a relative path with only normal components
///
/// - Leading slashes are stripped
/// - `.` components are skipped
/// - `..` components are rejected
/// - Empty results are rejected
///
/// # Examples
///
/// ```
/// use debrepack::path::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("usr/bin/tool").unwrap(), PathBuf::from("usr/bin/tool"));
/// assert_eq!(sanitize_path("/usr/bin/tool").unwrap(), PathBuf::from("usr/bin/tool"));
/// assert!(sanitize_path("../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir => {
                return Err(Error::PathTraversal(path.display().to_string()));
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "'{}' names no file or directory",
            path.display()
        )));
    }
    Ok(normalized)
}

/// Join an untrusted relative path onto a staging root
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    Ok(root.as_ref().join(sanitize_path(path)?))
}

/// Resolve a configured destination against a staging root
///
/// A destination ending in `/` names a directory; the source file keeps its
/// basename underneath it.
pub fn resolve_destination(root: &Path, dst: &str, source: &Path) -> Result<PathBuf> {
    let base = safe_join(root, dst)?;
    if !dst.ends_with('/') {
        return Ok(base);
    }
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", source.display())))?;
    Ok(base.join(file_name))
}

/// Render a relative path with `/` separators for pattern matching
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

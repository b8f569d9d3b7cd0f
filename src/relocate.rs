// src/relocate.rs

//! Move rules: pick files out of an extracted tree and place them in the
//! package tree
//!
//! Relocation runs in two stages so the tree is never walked while it is
//! being changed:
//!
//! 1. Snapshot every regular file under the extraction root once.
//! 2. For each rule, in declared order, test its pattern against the
//!    snapshot's relative paths (`/`-separated, full path) and relocate each
//!    match to the rule's destination with the rule's mode.
//!
//! Rules may overlap. Every placement reads the untouched original: a file
//! matched by several rules is copied for all but its last match, which
//! moves it. Two sources landing on one destination leave the later one.

use crate::config::MoveRule;
use crate::error::{Error, Result};
use crate::path::{resolve_destination, to_slash};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One file placed by one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Index of the rule that matched
    pub rule: usize,
    /// Path relative to the extraction root, `/`-separated
    pub source: String,
    /// Absolute destination path
    pub destination: PathBuf,
    pub mode: u32,
}

/// Everything a rule set relocated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    pub relocations: Vec<Relocation>,
}

impl RelocationReport {
    /// Number of files placed
    pub fn len(&self) -> usize {
        self.relocations.len()
    }

    /// True when no rule matched anything
    pub fn is_empty(&self) -> bool {
        self.relocations.is_empty()
    }
}

/// List regular files under `root` as sorted relative paths
pub fn snapshot_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to walk {}: {e}", root.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).map_err(|_| {
            Error::InvalidPath(format!(
                "{} is outside {}",
                entry.path().display(),
                root.display()
            ))
        })?;
        files.push(relative.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Compile every rule pattern, tagging failures with the rule index
pub fn compile_rules(artifact: &str, rules: &[MoveRule]) -> Result<Vec<Regex>> {
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            Regex::new(&rule.src_regex).map_err(|source| Error::RuleCompile {
                artifact: artifact.to_string(),
                index,
                source,
            })
        })
        .collect()
}

/// Apply `rules` in order, moving matches from `source_root` into `dest_root`
pub fn apply_rules(
    artifact: &str,
    source_root: &Path,
    rules: &[MoveRule],
    dest_root: &Path,
) -> Result<RelocationReport> {
    let patterns = compile_rules(artifact, rules)?;
    let snapshot = snapshot_files(source_root)?;
    debug!(
        "{}: {} files in {}, {} rules",
        artifact,
        snapshot.len(),
        source_root.display(),
        rules.len()
    );

    let mut planned = Vec::new();
    for (index, (rule, pattern)) in rules.iter().zip(&patterns).enumerate() {
        for relative in &snapshot {
            let source = to_slash(relative);
            if pattern.is_match(&source) {
                let destination = resolve_destination(dest_root, &rule.dst, relative)?;
                planned.push((index, relative, source, destination, rule.mode));
            }
        }
    }

    // Index of the final placement of each source file
    let mut last_use: HashMap<&Path, usize> = HashMap::new();
    for (position, (_, relative, ..)) in planned.iter().enumerate() {
        last_use.insert(relative.as_path(), position);
    }

    let mut placed_from: HashMap<PathBuf, &str> = HashMap::new();
    let mut report = RelocationReport::default();

    for (position, (index, relative, source, destination, mode)) in planned.iter().enumerate() {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }
        if let Some(previous) = placed_from.insert(destination.clone(), source.as_str())
            && previous != source.as_str()
        {
            warn!(
                "{}: {} replaces {} at {}",
                artifact,
                source,
                previous,
                destination.display()
            );
        }

        let original = source_root.join(relative);
        if last_use.get(relative.as_path()) == Some(&position) {
            relocate_file(&original, destination)?;
        } else {
            copy_file(&original, destination)?;
        }

        fs::set_permissions(destination, fs::Permissions::from_mode(*mode))?;
        debug!("rule #{}: {} -> {} ({:o})", index, source, destination.display(), mode);

        report.relocations.push(Relocation {
            rule: *index,
            source: source.clone(),
            destination: destination.clone(),
            mode: *mode,
        });
    }

    info!("{}: relocated {} files", artifact, report.len());
    Ok(report)
}

/// Move a file, copying and deleting when the rename crosses devices
pub fn relocate_file(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("Rename across devices for {}, copying instead", src.display());
            copy_then_remove(src, dst)
        }
        Err(e) => Err(Error::IoError(format!(
            "Failed to move {} to {}: {e}",
            src.display(),
            dst.display()
        ))),
    }
}

/// Copy `src` to `dst`, then delete `src`
pub fn copy_then_remove(src: &Path, dst: &Path) -> Result<()> {
    copy_file(src, dst)?;
    fs::remove_file(src)
        .map_err(|e| Error::IoError(format!("Failed to remove {}: {e}", src.display())))
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).map_err(|e| {
        Error::IoError(format!(
            "Failed to copy {} to {}: {e}",
            src.display(),
            dst.display()
        ))
    })?;
    Ok(())
}

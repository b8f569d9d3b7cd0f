// src/extras.rs

//! Supplementary downloads placed straight into a package tree
//!
//! Extra files (man pages, completions, config samples) are fetched after
//! move rules have run, so archive rules can never pick them up.

use crate::config::ExtraFile;
use crate::error::Result;
use crate::fetch::{Fetcher, download_to};
use crate::path::safe_join;
use crate::template::{TemplateVars, UnknownPlaceholders};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fetch every extra file into `dest_root`, returning the placed paths
pub fn fetch_extras(
    fetcher: &dyn Fetcher,
    extras: &[ExtraFile],
    vars: &TemplateVars,
    unknown: UnknownPlaceholders,
    dest_root: &Path,
) -> Result<Vec<PathBuf>> {
    let mut placed = Vec::with_capacity(extras.len());

    for extra in extras {
        let url = vars.render(&extra.url, unknown)?;
        let dest = safe_join(dest_root, &extra.dst)?;
        download_to(fetcher, &dest, &url)?;
        fs::set_permissions(&dest, fs::Permissions::from_mode(extra.mode))?;
        debug!("Placed extra file {} ({:o})", dest.display(), extra.mode);
        placed.push(dest);
    }

    Ok(placed)
}

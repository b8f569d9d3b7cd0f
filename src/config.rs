// src/config.rs

//! Package and app list definitions
//!
//! Two YAML lists drive a run:
//!
//! ```yaml
//! # package.yml - upstream .deb files shipped as-is
//! - name: gh
//!   version: 2.40.0
//!   url: https://github.com/cli/cli/releases/download/v{{ version }}/gh_{{ version }}_linux_{{ deb_architecture }}.deb
//! ```
//!
//! ```yaml
//! # app.yml - release archives repackaged into .debs
//! - name: vale
//!   version: 3.0.0
//!   url: https://github.com/errata-ai/vale/releases/download/v{{ version }}/vale_{{ version }}_Linux_{{ vale_architecture }}.tar.gz
//!   move_rules:
//!     - src_regex: ^vale$
//!       dst: usr/bin/vale
//!       mode: "0755"
//! ```

use crate::arch::Architecture;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Default mode for files placed by move rules
pub const DEFAULT_RULE_MODE: u32 = 0o755;

/// Default mode for extra files
pub const DEFAULT_EXTRA_MODE: u32 = 0o644;

/// An upstream package file downloaded verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub url: String,
    pub version: String,
}

/// An upstream release archive repackaged into a .deb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSpec {
    pub name: String,
    pub url: String,
    pub version: String,

    /// URL template overrides keyed by architecture id
    #[serde(default)]
    pub urls: BTreeMap<String, String>,

    /// Package name overrides keyed by architecture id
    #[serde(default)]
    pub names: BTreeMap<String, String>,

    /// Relocation rules, applied in order
    #[serde(default)]
    pub move_rules: Vec<MoveRule>,

    /// Files downloaded straight into the package tree
    #[serde(default)]
    pub extra_files: Vec<ExtraFile>,
}

impl AppSpec {
    /// URL template for the given architecture
    pub fn url_for(&self, arch: &Architecture) -> &str {
        self.urls.get(&arch.id).unwrap_or(&self.url)
    }

    /// Package name for the given architecture
    pub fn name_for(&self, arch: &Architecture) -> &str {
        self.names.get(&arch.id).unwrap_or(&self.name)
    }
}

/// Move a matching file from the extracted tree into the package tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRule {
    /// Pattern tested against the file path relative to the extraction root
    pub src_regex: String,
    /// Destination relative to the package root; a trailing `/` keeps the basename
    pub dst: String,
    #[serde(default = "default_rule_mode", deserialize_with = "deserialize_mode")]
    pub mode: u32,
}

/// A supplementary file fetched into the package tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFile {
    pub url: String,
    pub dst: String,
    #[serde(default = "default_extra_mode", deserialize_with = "deserialize_mode")]
    pub mode: u32,
}

fn default_rule_mode() -> u32 {
    DEFAULT_RULE_MODE
}

fn default_extra_mode() -> u32 {
    DEFAULT_EXTRA_MODE
}

/// Parse a permission mode written as octal text (`0755`, `755`, `0o755`)
pub fn parse_mode(s: &str) -> Result<u32> {
    let digits = s.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| Error::Config(format!("Invalid file mode '{}': {}", s, e)))?;
    if mode > 0o7777 {
        return Err(Error::Config(format!("File mode '{}' out of range", s)));
    }
    Ok(mode)
}

/// Modes are strings parsed as octal, or integers taken literally
fn deserialize_mode<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawMode {
        Int(u32),
        Text(String),
    }

    match RawMode::deserialize(deserializer)? {
        RawMode::Int(mode) if mode <= 0o7777 => Ok(mode),
        RawMode::Int(mode) => Err(serde::de::Error::custom(format!(
            "file mode {mode} out of range"
        ))),
        RawMode::Text(text) => parse_mode(&text).map_err(serde::de::Error::custom),
    }
}

/// Everything one run packages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub packages: Vec<PackageSpec>,
    pub apps: Vec<AppSpec>,
}

impl Manifest {
    /// Load the package list and the app list
    pub fn load(packages_path: &Path, apps_path: &Path) -> Result<Self> {
        let packages: Vec<PackageSpec> = load_yaml_list(packages_path)?;
        let apps: Vec<AppSpec> = load_yaml_list(apps_path)?;
        info!(
            "Loaded {} packages from {} and {} apps from {}",
            packages.len(),
            packages_path.display(),
            apps.len(),
            apps_path.display()
        );
        Ok(Self { packages, apps })
    }

    /// Keep only entries named `name`; a list with no match becomes empty
    pub fn restrict_to(mut self, name: &str) -> Self {
        self.packages.retain(|p| p.name == name);
        self.apps.retain(|a| a.name == name);
        debug!(
            "Restricted to '{}': {} packages, {} apps",
            name,
            self.packages.len(),
            self.apps.len()
        );
        self
    }

    /// True when there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.apps.is_empty()
    }
}

/// Load a target architecture table
pub fn load_architectures(path: &Path) -> Result<Vec<Architecture>> {
    let archs: Vec<Architecture> = load_yaml_list(path)?;
    if archs.is_empty() {
        return Err(Error::Config(format!(
            "{} declares no architectures",
            path.display()
        )));
    }
    Ok(archs)
}

/// Read a YAML file holding a list; an empty file is an empty list
fn load_yaml_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_yaml_list(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

fn parse_yaml_list<T: serde::de::DeserializeOwned>(
    content: &str,
) -> std::result::Result<Vec<T>, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_yaml::from_str::<Option<Vec<T>>>(content)?.unwrap_or_default())
}

// src/pipeline.rs

//! Run orchestration
//!
//! Every (artifact, architecture) pair goes through its own pipeline:
//!
//! ```text
//! Idle -> ResolvingUrl -> Downloading -> Extracting* -> Relocating
//!      -> FetchingExtras -> WritingControl -> Building -> Done
//! ```
//!
//! `Extracting` is skipped for opaque downloads (no extension), which are
//! copied into the extraction root as the last step of `Downloading`. Upstream
//! `.deb` packages stop after `Downloading`. Any stage can move the pair to
//! `Failed`; the error is wrapped in [`Error::Pipeline`] naming the stage.
//!
//! A run walks architectures in the outer loop and, within one architecture,
//! all packages and then all apps, one pair at a time.
//!
//! # Directory layout
//!
//! ```text
//! <cache>/<deb-arch>/<name>/<version>/<file>   downloads, reused across runs
//! <work>/<deb-arch>/<name>/src/                extracted upstream content
//! <work>/<deb-arch>/<name>/pkg/                package tree + DEBIAN/control
//! <output>/<deb-arch>/<name>_<version>_<deb-arch>.deb
//! ```

use crate::arch::Architecture;
use crate::builder::PackageBuilder;
use crate::config::{AppSpec, Manifest, PackageSpec};
use crate::control::ControlFile;
use crate::error::{Error, Result};
use crate::extract::{ArchiveKind, extract_as};
use crate::extras::fetch_extras;
use crate::fetch::{Fetcher, download_cached, file_name_from_url};
use crate::relocate::apply_rules;
use crate::template::{TemplateVars, UnknownPlaceholders};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where one pair currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ResolvingUrl,
    /// Fetching into the cache; pre-built downloads are also placed into
    /// the extraction root here
    Downloading,
    Extracting,
    Relocating,
    FetchingExtras,
    WritingControl,
    Building,
    Done,
    Failed,
}

impl Stage {
    /// Present-participle description used in errors and logs
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Idle => "preparing staging",
            Self::ResolvingUrl => "resolving URL",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Relocating => "applying move rules",
            Self::FetchingExtras => "fetching extra files",
            Self::WritingControl => "writing control file",
            Self::Building => "building package",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether the pair has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// What a failed pair does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// First failure ends the run; later pairs are never attempted
    #[default]
    FailFast,
    /// Attempt every pair, then fail if any pair failed
    KeepGoing,
}

/// Directory roots for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub cache_dir: PathBuf,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("tmp"),
            work_dir: PathBuf::from("work"),
            output_dir: PathBuf::from("dist"),
        }
    }
}

impl Layout {
    /// Put cache, work and output directories under one root
    pub fn under(root: &Path) -> Self {
        Self {
            cache_dir: root.join("cache"),
            work_dir: root.join("work"),
            output_dir: root.join("dist"),
        }
    }

    /// Download directory for one artifact version
    pub fn cache_dir_for(&self, arch: &Architecture, name: &str, version: &str) -> PathBuf {
        self.cache_dir.join(&arch.deb).join(name).join(version)
    }

    /// Staging directory for one pair
    pub fn staging_dir_for(&self, arch: &Architecture, name: &str) -> PathBuf {
        self.work_dir.join(&arch.deb).join(name)
    }

    /// Output directory for one architecture
    pub fn output_dir_for(&self, arch: &Architecture) -> PathBuf {
        self.output_dir.join(&arch.deb)
    }

    /// Output package path for one pair
    pub fn package_path(&self, arch: &Architecture, name: &str, version: &str) -> PathBuf {
        self.output_dir_for(arch)
            .join(format!("{}_{}_{}.deb", name, version, arch.deb))
    }
}

/// Behavior switches for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineOptions {
    pub unknown_placeholders: UnknownPlaceholders,
    pub failure_policy: FailurePolicy,
}

/// One package file a run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    pub artifact: String,
    pub arch: String,
    pub path: PathBuf,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub produced: Vec<Produced>,
}

/// State tracker for one (artifact, architecture) pair
struct PairRun<'a> {
    artifact: &'a str,
    arch: &'a str,
    stage: Stage,
}

impl<'a> PairRun<'a> {
    fn new(artifact: &'a str, arch: &'a str) -> Self {
        Self {
            artifact,
            arch,
            stage: Stage::Idle,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("{} ({}): {:?} -> {:?}", self.artifact, self.arch, self.stage, stage);
        self.stage = stage;
    }

    /// Enter `stage` and run `work` in it
    fn step<T>(&mut self, stage: Stage, work: impl FnOnce() -> Result<T>) -> Result<T> {
        self.enter(stage);
        work().map_err(|e| self.fail(e))
    }

    fn fail(&mut self, source: Error) -> Error {
        let failed_in = self.stage;
        self.enter(Stage::Failed);
        Error::Pipeline {
            artifact: self.artifact.to_string(),
            arch: self.arch.to_string(),
            stage: failed_in.describe(),
            source: Box::new(source),
        }
    }

    fn finish(&mut self) {
        self.enter(Stage::Done);
    }
}

/// Drives pairs through the packaging stages
pub struct Pipeline<'a> {
    fetcher: &'a dyn Fetcher,
    builder: &'a dyn PackageBuilder,
    layout: Layout,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        builder: &'a dyn PackageBuilder,
        layout: Layout,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            builder,
            layout,
            options,
        }
    }

    /// Directory layout in use
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Package every artifact for every architecture
    pub fn run(&self, manifest: &Manifest, archs: &[Architecture]) -> Result<RunSummary> {
        let total = archs.len() * (manifest.packages.len() + manifest.apps.len());
        info!(
            "Packaging {} packages and {} apps for {} architectures",
            manifest.packages.len(),
            manifest.apps.len(),
            archs.len()
        );

        let mut summary = RunSummary::default();
        let mut failed = 0;

        for arch in archs {
            for package in &manifest.packages {
                let result = self.run_package(package, arch);
                self.record(result, &package.name, arch, &mut summary, &mut failed)?;
            }
            for app in &manifest.apps {
                let result = self.run_app(app, arch);
                self.record(result, app.name_for(arch), arch, &mut summary, &mut failed)?;
            }
        }

        if failed > 0 {
            return Err(Error::BatchFailed { failed, total });
        }

        info!("Produced {} packages", summary.produced.len());
        Ok(summary)
    }

    fn record(
        &self,
        result: Result<PathBuf>,
        artifact: &str,
        arch: &Architecture,
        summary: &mut RunSummary,
        failed: &mut usize,
    ) -> Result<()> {
        match result {
            Ok(path) => {
                summary.produced.push(Produced {
                    artifact: artifact.to_string(),
                    arch: arch.deb.clone(),
                    path,
                });
                Ok(())
            }
            Err(e) => match self.options.failure_policy {
                FailurePolicy::FailFast => Err(e),
                FailurePolicy::KeepGoing => {
                    error!("{}", e);
                    *failed += 1;
                    Ok(())
                }
            },
        }
    }

    /// Fetch an upstream package and copy it into the output directory
    pub fn run_package(&self, package: &PackageSpec, arch: &Architecture) -> Result<PathBuf> {
        let mut run = PairRun::new(&package.name, &arch.deb);
        info!("Fetching package {} {} ({})", package.name, package.version, arch.deb);

        let url = run.step(Stage::ResolvingUrl, || {
            TemplateVars::for_target(&package.version, arch)
                .render(&package.url, self.options.unknown_placeholders)
        })?;

        let output = self.layout.package_path(arch, &package.name, &package.version);
        run.step(Stage::Downloading, || {
            let cache_dir = self.layout.cache_dir_for(arch, &package.name, &package.version);
            let cached =
                download_cached(self.fetcher, &cache_dir, &file_name_from_url(&url), &url)?;
            copy_into_output(&cached, &output)
        })?;

        run.finish();
        Ok(output)
    }

    /// Extract, rearrange and build one app for one architecture
    pub fn run_app(&self, app: &AppSpec, arch: &Architecture) -> Result<PathBuf> {
        let name = app.name_for(arch);
        let mut run = PairRun::new(name, &arch.deb);
        info!("Packaging {} {} ({})", name, app.version, arch.deb);

        let staging = self.layout.staging_dir_for(arch, name);
        let extract_root = staging.join("src");
        let package_root = staging.join("pkg");
        run.step(Stage::Idle, || {
            fresh_staging(&staging, &[extract_root.as_path(), package_root.as_path()])
        })?;

        let vars = TemplateVars::for_target(&app.version, arch);
        let url = run.step(Stage::ResolvingUrl, || {
            vars.render(app.url_for(arch), self.options.unknown_placeholders)
        })?;
        let filename = file_name_from_url(&url);

        // Pre-built files skip extraction; placing them is part of the download
        let kind = ArchiveKind::from_file_name(&filename);
        let download = run.step(Stage::Downloading, || {
            let cache_dir = self.layout.cache_dir_for(arch, name, &app.version);
            let download = download_cached(self.fetcher, &cache_dir, &filename, &url)?;
            if let Ok(ArchiveKind::Opaque) = kind {
                debug!("{} is pre-built, skipping extraction", filename);
                extract_as(&download, &extract_root, ArchiveKind::Opaque)?;
            }
            Ok(download)
        })?;

        let kind = kind.map_err(|e| {
            run.enter(Stage::Extracting);
            run.fail(e)
        })?;
        if kind.is_archive() {
            run.step(Stage::Extracting, || extract_as(&download, &extract_root, kind))?;
        }

        run.step(Stage::Relocating, || {
            let report = apply_rules(&app.name, &extract_root, &app.move_rules, &package_root)?;
            if report.is_empty() {
                return Err(Error::NoAssets {
                    artifact: name.to_string(),
                    arch: arch.deb.clone(),
                });
            }
            Ok(())
        })?;

        if !app.extra_files.is_empty() {
            run.step(Stage::FetchingExtras, || {
                fetch_extras(
                    self.fetcher,
                    &app.extra_files,
                    &vars,
                    self.options.unknown_placeholders,
                    &package_root,
                )
            })?;
        }

        run.step(Stage::WritingControl, || {
            ControlFile::new(name, &app.version, &arch.deb).write(&package_root)
        })?;

        let output = self.layout.package_path(arch, name, &app.version);
        run.step(Stage::Building, || {
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            self.builder.build(&package_root, &output)
        })?;

        run.finish();
        Ok(output)
    }
}

/// Wipe and recreate a pair's staging directory
fn fresh_staging(staging: &Path, subdirs: &[&Path]) -> Result<()> {
    if staging.exists() {
        warn!("Removing stale staging tree {}", staging.display());
        fs::remove_dir_all(staging).map_err(|e| {
            Error::IoError(format!("Failed to remove {}: {e}", staging.display()))
        })?;
    }
    for dir in subdirs {
        fs::create_dir_all(dir)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", dir.display())))?;
    }
    Ok(())
}

fn copy_into_output(source: &Path, output: &Path) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, output).map_err(|e| {
        Error::IoError(format!(
            "Failed to copy {} to {}: {e}",
            source.display(),
            output.display()
        ))
    })?;
    Ok(output.to_path_buf())
}

// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use debrepack::{
    DpkgDeb, FailurePolicy, HttpFetcher, Layout, Manifest, Pipeline, PipelineOptions,
    UnknownPlaceholders, default_architectures, load_architectures,
};
use debrepack::fetch::DEFAULT_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "debrepack")]
#[command(author, version, about = "Repackage upstream releases as Debian packages", long_about = None)]
struct Cli {
    /// Upstream .deb packages to fetch
    #[arg(long, default_value = "package.yml")]
    packages: PathBuf,

    /// Apps to repackage
    #[arg(long, default_value = "app.yml")]
    apps: PathBuf,

    /// Architecture table replacing the built-in amd64/arm64 table
    #[arg(long)]
    arch_file: Option<PathBuf>,

    /// Only process the artifact with this name
    #[arg(long)]
    only: Option<String>,

    /// Download cache directory
    #[arg(long, default_value = "tmp")]
    cache_dir: PathBuf,

    /// Staging directory
    #[arg(long, default_value = "work")]
    work_dir: PathBuf,

    /// Directory receiving the finished packages
    #[arg(long, default_value = "dist")]
    output_dir: PathBuf,

    /// Overall timeout for one download, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Fail on URL placeholders with no value instead of keeping them
    #[arg(long)]
    strict_templates: bool,

    /// Attempt every artifact even after a failure
    #[arg(long)]
    keep_going: bool,

    /// Package builder executable
    #[arg(long, default_value = "dpkg-deb")]
    builder: String,

    /// Run the builder directly instead of under fakeroot
    #[arg(long)]
    no_fakeroot: bool,

    /// Show download progress bars
    #[arg(long)]
    progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Load both artifact lists, narrowed by `--only`
///
/// A name that matches nothing leaves an empty manifest and an empty run.
fn load_manifest(cli: &Cli) -> Result<Manifest> {
    let manifest = Manifest::load(&cli.packages, &cli.apps)
        .context("Failed to load artifact lists")?;
    let Some(name) = &cli.only else {
        return Ok(manifest);
    };

    let manifest = manifest.restrict_to(name);
    if manifest.is_empty() {
        warn!("No package or app named '{}', nothing to do", name);
    }
    Ok(manifest)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // All configuration is read before anything touches the network
    let manifest = load_manifest(&cli)?;

    let archs = match &cli.arch_file {
        Some(path) => load_architectures(path).context("Failed to load architecture table")?,
        None => default_architectures(),
    };

    let fetcher = HttpFetcher::new(Duration::from_secs(cli.timeout))?.with_progress(cli.progress);
    let wrapper = if cli.no_fakeroot {
        None
    } else {
        Some("fakeroot".to_string())
    };
    let builder = DpkgDeb::default()
        .with_program(cli.builder)
        .with_wrapper(wrapper);

    let layout = Layout {
        cache_dir: cli.cache_dir,
        work_dir: cli.work_dir,
        output_dir: cli.output_dir,
    };
    let options = PipelineOptions {
        unknown_placeholders: if cli.strict_templates {
            UnknownPlaceholders::Reject
        } else {
            UnknownPlaceholders::Keep
        },
        failure_policy: if cli.keep_going {
            FailurePolicy::KeepGoing
        } else {
            FailurePolicy::FailFast
        },
    };

    let summary = Pipeline::new(&fetcher, &builder, layout, options).run(&manifest, &archs)?;

    for produced in &summary.produced {
        println!("{}", produced.path.display());
    }
    info!("Done: {} packages", summary.produced.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli_with_lists(temp: &TempDir, extra: &[&str]) -> Cli {
        let packages = temp.path().join("package.yml");
        let apps = temp.path().join("app.yml");
        std::fs::write(&packages, "- name: gh\n  version: \"2\"\n  url: https://x/gh.deb\n").unwrap();
        std::fs::write(&apps, "").unwrap();

        let mut args = vec![
            "debrepack".to_string(),
            "--packages".to_string(),
            packages.display().to_string(),
            "--apps".to_string(),
            apps.display().to_string(),
        ];
        args.extend(extra.iter().map(|a| a.to_string()));
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_only_without_match_is_empty_run() {
        let temp = TempDir::new().unwrap();
        let cli = cli_with_lists(&temp, &["--only", "missing"]);

        let manifest = load_manifest(&cli).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_only_with_match_keeps_entry() {
        let temp = TempDir::new().unwrap();
        let cli = cli_with_lists(&temp, &["--only", "gh"]);

        let manifest = load_manifest(&cli).unwrap();
        assert_eq!(manifest.packages.len(), 1);
        assert!(manifest.apps.is_empty());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["debrepack"]).unwrap();
        assert_eq!(cli.packages, PathBuf::from("package.yml"));
        assert_eq!(cli.timeout, 300);
        assert!(!cli.keep_going);
    }
}

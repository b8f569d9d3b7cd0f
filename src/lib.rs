// src/lib.rs

//! debrepack
//!
//! Repackages upstream release artifacts as Debian binary packages for a
//! fixed set of target architectures.
//!
//! # Architecture
//!
//! - Declarative input: `package.yml` lists upstream `.deb` files, `app.yml`
//!   lists archives or binaries to repackage
//! - Templated URLs: `{{ version }}`, `{{ deb_architecture }}` and one
//!   placeholder per architecture naming variant
//! - Move rules: regex-selected files relocated into the package tree
//! - One pipeline per (artifact, architecture) pair, ending in `dpkg-deb`

pub mod arch;
pub mod builder;
pub mod config;
pub mod control;
mod error;
pub mod extract;
pub mod extras;
pub mod fetch;
pub mod path;
pub mod pipeline;
pub mod relocate;
pub mod template;

pub use arch::{Architecture, default_architectures};
pub use builder::{DpkgDeb, PackageBuilder};
pub use config::{AppSpec, ExtraFile, Manifest, MoveRule, PackageSpec, load_architectures};
pub use error::{Error, Result};
pub use extract::ArchiveKind;
pub use fetch::{Fetcher, HttpFetcher};
pub use pipeline::{FailurePolicy, Layout, Pipeline, PipelineOptions, RunSummary, Stage};
pub use template::{TemplateVars, UnknownPlaceholders};

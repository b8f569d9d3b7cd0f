// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use debrepack::{Error, Fetcher, PackageBuilder, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Build an in-memory .tar.gz from (path, contents, mode) entries
pub fn tar_gz(entries: &[(&str, &str, u32)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves fixed bodies by URL and counts requests
#[derive(Default)]
pub struct FakeFetcher {
    bodies: HashMap<String, Vec<u8>>,
    pub requests: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.requests.borrow_mut().push(url.to_string());
        match self.bodies.get(url) {
            Some(body) => {
                sink.write_all(body)?;
                Ok(body.len() as u64)
            }
            None => Err(Error::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// What the fake builder saw for one build
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub output: PathBuf,
    /// Files under the staging tree, relative and `/`-separated, sorted
    pub files: Vec<String>,
    pub control: String,
}

/// Records the staging tree and writes the control file as the "package"
#[derive(Default)]
pub struct FakeBuilder {
    pub builds: RefCell<Vec<BuildRecord>>,
}

impl PackageBuilder for FakeBuilder {
    fn build(&self, staging: &Path, output: &Path) -> Result<()> {
        let mut files: Vec<String> = WalkDir::new(staging)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(staging)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();

        let control = fs::read_to_string(staging.join("DEBIAN/control"))?;
        fs::write(output, &control)?;
        self.builds.borrow_mut().push(BuildRecord {
            output: output.to_path_buf(),
            files,
            control,
        });
        Ok(())
    }
}

/// Write package.yml and app.yml into `dir`, returning their paths
pub fn write_lists(dir: &Path, packages: &str, apps: &str) -> (PathBuf, PathBuf) {
    let packages_path = dir.join("package.yml");
    let apps_path = dir.join("app.yml");
    fs::write(&packages_path, packages).unwrap();
    fs::write(&apps_path, apps).unwrap();
    (packages_path, apps_path)
}

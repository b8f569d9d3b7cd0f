// src/builder.rs

//! External package builder invocation
//!
//! The finished staging tree is handed to `dpkg-deb --build <dir> <out>`,
//! normally under `fakeroot` so files are owned by root inside the archive
//! without the run needing real root. The tool's stdout and stderr pass
//! straight through to the operator.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Turns a staging tree into a package file
pub trait PackageBuilder {
    /// Build `staging` into `output`
    fn build(&self, staging: &Path, output: &Path) -> Result<()>;
}

/// `dpkg-deb`-compatible builder command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpkgDeb {
    /// Builder executable
    pub program: String,
    /// Arguments placed before the staging and output paths
    pub args: Vec<String>,
    /// Privilege wrapper the builder runs under, if any
    pub wrapper: Option<String>,
}

impl Default for DpkgDeb {
    fn default() -> Self {
        Self {
            program: "dpkg-deb".to_string(),
            args: vec!["--build".to_string()],
            wrapper: Some("fakeroot".to_string()),
        }
    }
}

impl DpkgDeb {
    /// Use a different builder executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the leading arguments
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set or clear the privilege wrapper
    pub fn with_wrapper(mut self, wrapper: Option<String>) -> Self {
        self.wrapper = wrapper;
        self
    }

    /// Locate the builder (and wrapper) on PATH
    fn resolve_tools(&self) -> Result<(PathBuf, Option<PathBuf>)> {
        let program = which::which(&self.program)
            .map_err(|_| Error::ToolNotFound(self.program.clone()))?;
        let wrapper = match &self.wrapper {
            Some(name) => Some(which::which(name).map_err(|_| Error::ToolNotFound(name.clone()))?),
            None => None,
        };
        Ok((program, wrapper))
    }

    /// The full command line for one build
    pub fn command_line(&self, staging: &Path, output: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::new();
        if let Some(wrapper) = &self.wrapper {
            argv.push(wrapper.into());
        }
        argv.push((&self.program).into());
        argv.extend(self.args.iter().map(OsString::from));
        argv.push(staging.as_os_str().to_owned());
        argv.push(output.as_os_str().to_owned());
        argv
    }
}

impl PackageBuilder for DpkgDeb {
    fn build(&self, staging: &Path, output: &Path) -> Result<()> {
        let (program, wrapper) = self.resolve_tools()?;

        let mut cmd = match wrapper {
            Some(wrapper) => {
                let mut cmd = Command::new(wrapper);
                cmd.arg(program);
                cmd
            }
            None => Command::new(program),
        };
        cmd.args(&self.args).arg(staging).arg(output);

        debug!("Running {:?}", cmd);
        let status = cmd.status().map_err(|e| {
            Error::IoError(format!("Failed to run {}: {e}", self.program))
        })?;

        if !status.success() {
            return Err(Error::BuildFailed {
                output: output.display().to_string(),
                code: status.code(),
            });
        }

        info!("Built {}", output.display());
        Ok(())
    }
}

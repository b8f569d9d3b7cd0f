// src/control.rs

//! DEBIAN/control generation

use crate::error::{Error, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Maintainer recorded in every generated package
pub const MAINTAINER: &str = "debrepack <debrepack@localhost>";

/// Section recorded in every generated package
pub const SECTION: &str = "utils";

/// Directory holding package metadata inside a staging root
pub const CONTROL_DIR: &str = "DEBIAN";

/// Fields of a binary package control file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFile {
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    pub section: String,
    pub description: String,
}

impl ControlFile {
    /// Control fields for a repackaged upstream artifact
    pub fn new(name: &str, version: &str, architecture: &str) -> Self {
        Self {
            package: name.to_string(),
            version: version.to_string(),
            architecture: architecture.to_string(),
            maintainer: MAINTAINER.to_string(),
            section: SECTION.to_string(),
            description: format!("{name} repackaged from upstream release"),
        }
    }

    /// Render in deb822 form
    pub fn render(&self) -> String {
        format!(
            "Package: {}\n\
             Version: {}\n\
             Architecture: {}\n\
             Maintainer: {}\n\
             Section: {}\n\
             Description: {}\n",
            self.package,
            self.version,
            self.architecture,
            self.maintainer,
            self.section,
            self.description
        )
    }

    /// Write `DEBIAN/control` under `root`, creating the directory if needed
    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let control_dir = root.join(CONTROL_DIR);
        fs::create_dir_all(&control_dir).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {e}", control_dir.display()))
        })?;

        // dpkg-deb rejects control directories with unusual permissions
        fs::set_permissions(&control_dir, fs::Permissions::from_mode(0o755))?;

        let path = control_dir.join("control");
        fs::write(&path, self.render())
            .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", path.display())))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_fields() {
        let control = ControlFile::new("foo", "1.2.3", "arm64").render();
        let lines: Vec<&str> = control.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Package: foo",
                "Version: 1.2.3",
                "Architecture: arm64",
                "Maintainer: debrepack <debrepack@localhost>",
                "Section: utils",
                "Description: foo repackaged from upstream release",
            ]
        );
    }

    #[test]
    fn test_write_creates_control_dir() {
        let temp = TempDir::new().unwrap();
        let path = ControlFile::new("foo", "1.2.3", "arm64").write(temp.path()).unwrap();

        assert_eq!(path, temp.path().join("DEBIAN/control"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Package: foo\n"));
        assert!(content.contains("Version: 1.2.3\n"));
        assert!(content.contains("Architecture: arm64\n"));
        assert!(!content.contains("{{"));
        assert!(!content.contains("}}"));
    }

    #[test]
    fn test_write_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let control = ControlFile::new("foo", "1.0", "amd64");
        control.write(temp.path()).unwrap();
        let path = control.write(temp.path()).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), control.render());
    }
}

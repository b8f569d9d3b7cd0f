// src/arch.rs

//! Target architectures and their per-ecosystem names
//!
//! Upstream projects name the same processor differently: Debian says
//! `amd64`, Ansible says `x86_64`, Vale ships `64-bit`. Each `Architecture`
//! carries the Debian name plus any number of named variants, and each
//! variant becomes a `<variant>_architecture` template variable.
//!
//! The table is data, not a global: callers build it with
//! [`default_architectures`] or load it from YAML and pass it into the
//! orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One target processor architecture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    /// Logical identifier, used as the key for per-architecture overrides
    pub id: String,

    /// Debian package architecture (`amd64`, `arm64`, ...)
    pub deb: String,

    /// Names used by other ecosystems, keyed by ecosystem
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

impl Architecture {
    /// Create an architecture with no extra variants
    pub fn new(id: impl Into<String>, deb: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deb: deb.into(),
            variants: BTreeMap::new(),
        }
    }

    /// Add a named variant
    pub fn with_variant(mut self, ecosystem: impl Into<String>, name: impl Into<String>) -> Self {
        self.variants.insert(ecosystem.into(), name.into());
        self
    }

    /// Look up the name this architecture has in another ecosystem
    pub fn variant(&self, ecosystem: &str) -> Option<&str> {
        self.variants.get(ecosystem).map(String::as_str)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.deb)
    }
}

/// The stock target table: amd64 and arm64
pub fn default_architectures() -> Vec<Architecture> {
    vec![
        Architecture::new("amd64", "amd64")
            .with_variant("ansible", "x86_64")
            .with_variant("vale", "64-bit")
            .with_variant("git_absorb", "x86_64")
            .with_variant("kubectl", "amd64"),
        Architecture::new("arm64", "arm64")
            .with_variant("ansible", "aarch64")
            .with_variant("vale", "arm64")
            .with_variant("git_absorb", "arm")
            .with_variant("kubectl", "arm64"),
    ]
}

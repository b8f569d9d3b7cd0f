// src/template.rs

//! URL templating
//!
//! Download URLs carry `{{ name }}` placeholders that are filled in per
//! (artifact, architecture) pair:
//!
//! - `version` - the artifact version
//! - `deb_architecture` - Debian architecture name
//! - `<variant>_architecture` - one per architecture variant
//!   (`ansible_architecture`, `vale_architecture`, ...)
//!
//! Substitution is a single left-to-right pass. Substituted values are never
//! scanned again, so a value containing `{{ ... }}` comes out literally.

use crate::arch::Architecture;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// What to do with a placeholder that has no variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPlaceholders {
    /// Leave the placeholder text in the output and log a warning
    #[default]
    Keep,
    /// Fail with [`Error::Template`]
    Reject,
}

/// Variables available to a URL template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    vars: BTreeMap<String, String>,
}

impl TemplateVars {
    /// Empty variable set
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables for one artifact version on one architecture
    pub fn for_target(version: &str, arch: &Architecture) -> Self {
        let mut vars = Self::new();
        vars.insert("version", version);
        vars.insert("deb_architecture", &arch.deb);
        for (ecosystem, name) in &arch.variants {
            vars.insert(format!("{ecosystem}_architecture"), name);
        }
        vars
    }

    /// Add or replace a variable
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Substitute every recognized placeholder in `template`
    pub fn render(&self, template: &str, unknown: UnknownPlaceholders) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);

            match self.get(name.as_str()) {
                Some(value) => out.push_str(value),
                None => match unknown {
                    UnknownPlaceholders::Keep => {
                        warn!("Leaving unknown placeholder {} in {}", whole.as_str(), template);
                        out.push_str(whole.as_str());
                    }
                    UnknownPlaceholders::Reject => {
                        return Err(Error::Template {
                            placeholder: name.as_str().to_string(),
                            template: template.to_string(),
                        });
                    }
                },
            }
            last = whole.end();
        }

        out.push_str(&template[last..]);
        Ok(out)
    }
}

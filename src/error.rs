// src/error.rs

//! Error types for the packaging pipeline

use thiserror::Error;

/// Result type alias using debrepack's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while turning upstream artifacts into Debian packages
#[derive(Error, Debug)]
pub enum Error {
    /// Package or app list could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level download failure (connect, timeout, body read)
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Server answered with a non-success status
    #[error("Failed to download {url}: HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Downloaded file has an extension no extractor handles
    #[error("Unknown archive format: {0}")]
    UnknownFormat(String),

    /// Corrupt archive, decompression failure, or broken tar stream
    #[error("Extraction failed: {0}")]
    ExtractionError(String),

    /// Unrecognized placeholder while strict templating is enabled
    #[error("Unresolved placeholder '{placeholder}' in '{template}'")]
    Template {
        placeholder: String,
        template: String,
    },

    /// A move rule pattern failed to compile
    #[error("Invalid move rule #{index} for '{artifact}': {source}")]
    RuleCompile {
        artifact: String,
        index: usize,
        #[source]
        source: regex::Error,
    },

    /// No move rule matched anything in the staging tree
    #[error("No assets found for '{artifact}' ({arch}): no move rule matched any file")]
    NoAssets { artifact: String, arch: String },

    /// Path escapes its root
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// Path is empty or otherwise unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Required executable is not on PATH
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// External package builder exited unsuccessfully
    #[error("Package build failed for {output} (exit code {code:?})")]
    BuildFailed { output: String, code: Option<i32> },

    /// A pipeline stage failed for one (artifact, architecture) pair
    #[error("{artifact} ({arch}) failed while {stage}: {source}")]
    Pipeline {
        artifact: String,
        arch: String,
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Keep-going run finished with failed pairs
    #[error("{failed} of {total} artifact builds failed")]
    BatchFailed { failed: usize, total: usize },

    /// Filesystem error with context
    #[error("IO error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Innermost error, looking through pipeline stage wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Pipeline { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

//! Error types shared across the depscan workspace.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the depscan [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by extractors, the cache, the scan engine, and the
/// resolver.
///
/// Every variant names the file it concerns where one exists; the scan
/// engine records extractor errors per file instead of aborting.
#[derive(Debug, Error)]
pub enum Error {
    /// File could not be opened, read, or listed.
    #[error("I/O error in {path}: {source}")]
    Io {
        /// File or directory the operation touched.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Syntax did not match the expected grammar.
    #[error("parse error in {path}: {detail}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// What the parser objected to.
        detail: String,
    },

    /// Structured file parsed but did not match the expected shape.
    #[error("schema error in {path}: {detail}")]
    Schema {
        /// File whose structure was unexpected.
        path: PathBuf,
        /// Which part of the document was malformed.
        detail: String,
    },

    /// A required companion file was absent.
    #[error("missing companion file: {path}")]
    MissingFile {
        /// The companion file that was looked for.
        path: PathBuf,
    },

    /// Cycle detected during strict resolution.
    #[error("circular dependencies detected: {cycles:?}")]
    Cycle {
        /// The offending cycles, each a path of package names.
        cycles: Vec<Vec<String>>,
    },

    /// The scan root itself could not be walked.
    #[error("failed to walk {path}: {detail}")]
    WalkFailed {
        /// The scan root.
        path: PathBuf,
        /// Why traversal stopped.
        detail: String,
    },
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a parse error for `path`.
    pub fn parse(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Build a schema error for `path`.
    pub fn schema(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Error::Schema {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// The file this error concerns, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Error::Io { path, .. }
            | Error::Parse { path, .. }
            | Error::Schema { path, .. }
            | Error::MissingFile { path }
            | Error::WalkFailed { path, .. } => Some(path),
            Error::Cycle { .. } => None,
        }
    }
}

//! # depscan-engine
//!
//! The concurrent scan engine: walks a project tree, dispatches each
//! recognized manifest to its extractor on a bounded worker pool,
//! aggregates records and per-file errors, consults the extraction
//! cache, publishes progress, and runs the analyzer over the final
//! record set.

#![warn(missing_docs)]

pub mod result;
pub mod scanner;

pub use result::{ScanError, ScanResult, ScanStatus};
pub use scanner::{ScanConfig, ScanPhase, ScanProgress, Scanner, DEFAULT_MAX_WORKERS};

//! # depscan-analysis
//!
//! Consumes the flat record list a scan produces and answers the
//! structural questions: what does the dependency graph look like,
//! where are the cycles and version conflicts, how deep does it go,
//! and (optionally) which concrete version should each package get.

#![warn(missing_docs)]

pub mod analyzer;
pub mod resolver;

pub use analyzer::{AnalysisResult, AnalysisStats, DependencyAnalyzer, VersionConflict};
pub use resolver::{
    FixedVersionProvider, ResolveOptions, ResolveResult, Resolver, ResolutionStrategy,
    VersionProvider,
};

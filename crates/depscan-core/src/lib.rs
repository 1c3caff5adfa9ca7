//! # depscan-core
//!
//! Shared data model for the depscan workspace:
//! - The uniform [`Dependency`] record every extractor produces
//! - Version [`Constraint`]s with a closed operator set
//! - The derived [`DependencyGraph`] with cycle detection
//! - The workspace-wide [`Error`] type
//!
//! Everything downstream (the scan engine, the analyzer, the resolver,
//! external report formatters) reads these types; nothing else in the
//! workspace defines its own dependency shape.

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod record;

pub use error::{Error, Result};
pub use graph::{DependencyGraph, GraphNode};
pub use record::{Constraint, ConstraintOp, Dependency, Scope};
